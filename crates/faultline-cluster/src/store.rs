//! Distributed-store cluster controller.
//!
//! Drives an ordered group of store nodes as a unit through external control
//! scripts: deploy, start/stop with liveness polling, partial shutdown and
//! restore for fault injection, and idempotent bucket-type provisioning.
//! Conceptually the cluster moves through `down / starting / up / stopping /
//! partially-down`; none of that is stored — liveness is always re-probed.

use crate::{CommandRunner, Error, Lifecycle, Node, Result};
use faultline_config::{HarnessConfig, LifecycleConfig};
use std::collections::BTreeSet;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

const DEPLOY_SCRIPT: &str = "create_store_devrel_from_tarball.sh";
const SERVICE_SCRIPT: &str = "service_store_nodes.sh";
const FORM_CLUSTER_SCRIPT: &str = "create_store_cluster.sh";
const TEARDOWN_CLUSTER_SCRIPT: &str = "teardown_store_cluster.sh";
const BUCKET_TYPE_STATUS_SCRIPT: &str = "bucket_type_status.sh";
const BUCKET_TYPE_CREATE_SCRIPT: &str = "bucket_type_create.sh";
const BUCKET_TYPE_ACTIVATE_SCRIPT: &str = "bucket_type_activate.sh";

/// Config directive the protobuf listener port is discovered from.
const PB_LISTENER_DIRECTIVE: &str = "listener.protobuf.internal";

/// An ordered group of distributed-store nodes managed as a unit.
///
/// Node order is significant: index 0 is the canonical node for single-node
/// administrative operations. `shutdown_set` tracks the nodes currently down
/// due to deliberate fault injection and is always a subset of membership.
pub struct StoreCluster {
    name: String,
    nodes: Vec<Node>,
    runner: CommandRunner,
    opts: LifecycleConfig,
    shutdown_set: BTreeSet<String>,
}

impl StoreCluster {
    /// Creates a controller over the given nodes.
    ///
    /// # Panics
    ///
    /// Panics if `nodes` is empty.
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, config: &HarnessConfig) -> Self {
        assert!(!nodes.is_empty(), "cluster requires at least one node");

        Self {
            name: name.into(),
            nodes,
            runner: CommandRunner::new(&config.lifecycle),
            opts: config.lifecycle.clone(),
            shutdown_set: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node names in cluster order.
    pub fn node_names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.name().to_string()).collect()
    }

    /// The index-0 node used for single-node administrative operations.
    pub fn canonical_node(&self) -> &Node {
        &self.nodes[0]
    }

    /// Names currently down due to deliberate fault injection.
    pub fn shutdown_set(&self) -> &BTreeSet<String> {
        &self.shutdown_set
    }

    /// Stops exactly `subset` to simulate a partial outage while the rest of
    /// the cluster keeps serving. Accumulates into the shutdown set across
    /// repeated calls; [`StoreCluster::restore`] heals everything recorded.
    pub async fn shutdown(&mut self, subset: &[String]) -> Result<()> {
        for name in subset {
            if !self.nodes.iter().any(|n| n.name() == name) {
                return Err(Error::UnknownNode {
                    cluster: self.name.clone(),
                    node: name.clone(),
                });
            }
        }

        info!(cluster = %self.name, nodes = ?subset, "shutting down node subset");
        self.service_command("stop", subset).await?;
        self.shutdown_set.extend(subset.iter().cloned());
        Ok(())
    }

    /// Restarts every node recorded by [`StoreCluster::shutdown`] and, once
    /// the cluster is back up, rejoins recovered nodes via cluster formation.
    ///
    /// Idempotent: with an empty shutdown set this returns `Ok(true)` without
    /// issuing any external command. On liveness timeout it returns
    /// `Ok(false)` and retains the shutdown set so a later call can retry.
    pub async fn restore(&mut self) -> Result<bool> {
        if self.shutdown_set.is_empty() {
            return Ok(true);
        }

        let names: Vec<String> = self.shutdown_set.iter().cloned().collect();
        info!(cluster = %self.name, nodes = ?names, "restoring shut-down nodes");

        let t0 = Instant::now();
        let up = loop {
            self.service_command("start", &names).await?;
            if self.is_alive().await {
                break true;
            }
            if t0.elapsed() > self.opts.max_start_wait() {
                break false;
            }
            sleep(self.opts.poll_interval()).await;
        };

        if up {
            self.shutdown_set.clear();
            if self.nodes.len() > 1 {
                self.form_cluster().await?;
            }
            info!(cluster = %self.name, elapsed_secs = t0.elapsed().as_secs_f64(), "restore complete");
        } else {
            warn!(
                cluster = %self.name,
                waited_secs = self.opts.max_start_wait_secs,
                "restore did not reach liveness; shutdown set retained"
            );
        }

        Ok(up)
    }

    /// Idempotent create-if-absent-then-activate provisioning of a bucket
    /// type against the canonical node. Auto-starts the cluster when it is
    /// not alive. Creation or activation not reporting success is fatal.
    pub async fn ensure_bucket_type(&self, bucket_type: &str) -> Result<()> {
        if !self.is_alive().await && !self.start().await? {
            return Err(Error::NotAlive {
                cluster: self.name.clone(),
                waited_secs: self.opts.max_start_wait_secs,
            });
        }

        let args = vec![
            self.canonical_node().name().to_string(),
            bucket_type.to_string(),
        ];

        if self.runner.probe(BUCKET_TYPE_STATUS_SCRIPT, &args).await? {
            debug!(cluster = %self.name, bucket_type, "bucket type already active");
            return Ok(());
        }

        self.runner
            .run(BUCKET_TYPE_CREATE_SCRIPT, &args, 0, self.opts.command_retry_delay())
            .await
            .map_err(|err| Error::Provisioning {
                bucket_type: bucket_type.to_string(),
                step: "create",
                reason: err.to_string(),
            })?;

        self.runner
            .run(BUCKET_TYPE_ACTIVATE_SCRIPT, &args, 0, self.opts.command_retry_delay())
            .await
            .map_err(|err| Error::Provisioning {
                bucket_type: bucket_type.to_string(),
                step: "activate",
                reason: err.to_string(),
            })?;

        info!(cluster = %self.name, bucket_type, "bucket type provisioned");
        Ok(())
    }

    /// Ensures the bucket type backing string values exists and is active.
    pub async fn ensure_string_dt(&self) -> Result<()> {
        self.ensure_bucket_type("strings").await
    }

    /// Ensures the bucket type backing set values exists and is active.
    pub async fn ensure_set_dt(&self) -> Result<()> {
        self.ensure_bucket_type("sets").await
    }

    /// Discovers a node's protobuf listener port from its deployed config.
    /// `Ok(None)` when the listener directive is absent.
    pub async fn port_for(&self, node_name: &str) -> Result<Option<u16>> {
        let node = self
            .nodes
            .iter()
            .find(|n| n.name() == node_name)
            .ok_or_else(|| Error::UnknownNode {
                cluster: self.name.clone(),
                node: node_name.to_string(),
            })?;

        Ok(node.discover_port(PB_LISTENER_DIRECTIVE)?)
    }

    /// Protobuf port of the canonical node, from its deployed config.
    pub async fn canonical_port(&self) -> Result<Option<u16>> {
        let canonical = self.canonical_node().name().to_string();
        self.port_for(&canonical).await
    }

    /// Joint service command (start/stop/ping) against the given node names,
    /// as a single external invocation with the configured retry budget.
    async fn service_command(&self, action: &str, names: &[String]) -> Result<()> {
        let mut args = Vec::with_capacity(names.len() + 1);
        args.push(action.to_string());
        args.extend(names.iter().cloned());

        self.runner
            .run(
                SERVICE_SCRIPT,
                &args,
                self.opts.command_retries,
                self.opts.command_retry_delay(),
            )
            .await
    }

    /// Joins all nodes into one logical cluster. Only meaningful (and only
    /// issued by callers) when the node count exceeds one.
    async fn form_cluster(&self) -> Result<()> {
        self.runner
            .run(
                FORM_CLUSTER_SCRIPT,
                &self.node_names(),
                self.opts.command_retries,
                self.opts.command_retry_delay(),
            )
            .await
    }
}

impl Lifecycle for StoreCluster {
    /// Materializes a runnable instance for every node from the packaged
    /// artifact. Filesystem-idempotent; implies nothing about liveness.
    async fn deploy(&self) -> Result<()> {
        info!(cluster = %self.name, nodes = self.nodes.len(), "deploying");

        for node in &self.nodes {
            self.runner
                .run(
                    DEPLOY_SCRIPT,
                    &[node.name().to_string(), node.base_port().to_string()],
                    0,
                    self.opts.command_retry_delay(),
                )
                .await?;
        }

        Ok(())
    }

    /// Brings the whole cluster up, polling liveness until it reports alive
    /// or the wall-clock bound elapses; then forms the cluster when there is
    /// more than one node. Returns whether the cluster reached `up` —
    /// callers must check rather than assume success.
    async fn start(&self) -> Result<bool> {
        if self.is_alive().await {
            warn!(cluster = %self.name, "already started");
            return Ok(true);
        }

        let t0 = Instant::now();
        let up = loop {
            self.service_command("start", &self.node_names()).await?;
            if self.is_alive().await {
                break true;
            }
            if t0.elapsed() > self.opts.max_start_wait() {
                break false;
            }
            sleep(self.opts.poll_interval()).await;
        };

        info!(
            cluster = %self.name,
            elapsed_secs = t0.elapsed().as_secs_f64(),
            up,
            "start finished"
        );

        // The start command itself succeeded; formation is skipped only on
        // outright start failure, which returned above.
        if self.nodes.len() > 1 {
            self.form_cluster().await?;
        }

        Ok(up)
    }

    /// Tears down membership (failures tolerated at that step only), stops
    /// all nodes, and polls until the liveness probe reports down or the
    /// wall-clock bound elapses.
    async fn stop(&self) -> Result<bool> {
        if !self.is_alive().await {
            warn!(cluster = %self.name, "already stopped");
            return Ok(true);
        }

        let t0 = Instant::now();
        let down = loop {
            if self.nodes.len() > 1 {
                // Teardown may legitimately fail, e.g. the cluster was never
                // formed. Swallowed here and nowhere else.
                if let Err(err) = self
                    .runner
                    .run(
                        TEARDOWN_CLUSTER_SCRIPT,
                        &self.node_names(),
                        self.opts.command_retries,
                        self.opts.command_retry_delay(),
                    )
                    .await
                {
                    warn!(cluster = %self.name, error = %err, "cluster teardown failed; continuing with stop");
                }
            }

            self.service_command("stop", &self.node_names()).await?;
            if !self.is_alive().await {
                break true;
            }
            if t0.elapsed() > self.opts.max_start_wait() {
                break false;
            }
            sleep(self.opts.poll_interval()).await;
        };

        info!(
            cluster = %self.name,
            elapsed_secs = t0.elapsed().as_secs_f64(),
            down,
            "stop finished"
        );
        Ok(down)
    }

    /// Joint ping with the configured retry budget. Any failure, timeout
    /// included, reads as "not alive"; probing never propagates an error.
    async fn is_alive(&self) -> bool {
        match self.service_command("ping", &self.node_names()).await {
            Ok(()) => true,
            Err(err) => {
                debug!(cluster = %self.name, error = %err, "liveness probe negative");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cluster(node_count: usize) -> StoreCluster {
        let nodes = (0..node_count)
            .map(|i| {
                Node::new(
                    format!("dev{i}"),
                    "127.0.0.1",
                    5400 + i as u16,
                    format!("/tmp/r/devrel_dev{i}"),
                )
            })
            .collect();
        StoreCluster::new("store", nodes, &HarnessConfig::default())
    }

    #[test]
    fn node_order_is_preserved() {
        let cluster = test_cluster(3);
        assert_eq!(cluster.node_names(), vec!["dev0", "dev1", "dev2"]);
        assert_eq!(cluster.canonical_node().name(), "dev0");
    }

    #[test]
    #[should_panic(expected = "at least one node")]
    fn empty_cluster_is_rejected() {
        let _ = StoreCluster::new("store", Vec::new(), &HarnessConfig::default());
    }

    #[tokio::test]
    async fn shutdown_rejects_non_members() {
        let mut cluster = test_cluster(3);

        let err = cluster
            .shutdown(&["devX".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownNode { .. }));
        assert!(cluster.shutdown_set().is_empty());
    }

    #[tokio::test]
    async fn restore_with_empty_shutdown_set_is_a_noop() {
        // No scripts exist anywhere near this cluster; restore must succeed
        // without attempting any external command.
        let mut cluster = test_cluster(3);
        assert!(cluster.restore().await.unwrap());
    }

    #[tokio::test]
    async fn port_for_unknown_node_is_an_error() {
        let cluster = test_cluster(1);
        assert!(matches!(
            cluster.port_for("devX").await,
            Err(Error::UnknownNode { .. })
        ));
    }
}
