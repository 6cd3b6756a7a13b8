//! Single-process backend controllers.
//!
//! [`KvServer`] manages one replicated key-value backend instance and
//! [`ProxyServer`] the cache proxy under test. Both are thin `Lifecycle`
//! implementations over per-role control scripts, with the same liveness
//! polling and probe-swallowing rules as [`crate::StoreCluster`].

use crate::{CommandRunner, Lifecycle, Node, Result};
use faultline_config::{HarnessConfig, LifecycleConfig};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

const KV_DEPLOY_SCRIPT: &str = "create_kv_node.sh";
const KV_SERVICE_SCRIPT: &str = "service_kv_node.sh";
const PROXY_DEPLOY_SCRIPT: &str = "create_proxy.sh";
const PROXY_SERVICE_SCRIPT: &str = "service_proxy.sh";

/// The proxy's stats/admin listener sits at a fixed offset above its
/// client-facing port.
pub const STATS_PORT_OFFSET: u16 = 1_000;

#[derive(Clone, Copy)]
struct Scripts {
    deploy: &'static str,
    service: &'static str,
}

/// Shared lifecycle mechanics for a single scripted process.
struct ScriptedServer {
    node: Node,
    cluster_name: String,
    runner: CommandRunner,
    opts: LifecycleConfig,
    scripts: Scripts,
}

impl ScriptedServer {
    fn new(node: Node, cluster_name: String, config: &HarnessConfig, scripts: Scripts) -> Self {
        Self {
            node,
            cluster_name,
            runner: CommandRunner::new(&config.lifecycle),
            opts: config.lifecycle.clone(),
            scripts,
        }
    }

    async fn deploy(&self, extra_args: &[String]) -> Result<()> {
        info!(server = %self.node.name(), "deploying");

        let mut args = vec![
            self.node.name().to_string(),
            self.node.host().to_string(),
            self.node.base_port().to_string(),
            self.node.work_dir().display().to_string(),
            self.cluster_name.clone(),
        ];
        args.extend(extra_args.iter().cloned());

        self.runner
            .run(self.scripts.deploy, &args, 0, self.opts.command_retry_delay())
            .await
    }

    async fn service(&self, action: &str) -> Result<()> {
        self.runner
            .run(
                self.scripts.service,
                &[action.to_string(), self.node.name().to_string()],
                self.opts.command_retries,
                self.opts.command_retry_delay(),
            )
            .await
    }

    async fn start(&self) -> Result<bool> {
        if self.is_alive().await {
            warn!(server = %self.node.name(), "already started");
            return Ok(true);
        }

        let t0 = Instant::now();
        let up = loop {
            self.service("start").await?;
            if self.is_alive().await {
                break true;
            }
            if t0.elapsed() > self.opts.max_start_wait() {
                break false;
            }
            sleep(self.opts.poll_interval()).await;
        };

        info!(
            server = %self.node.name(),
            elapsed_secs = t0.elapsed().as_secs_f64(),
            up,
            "start finished"
        );
        Ok(up)
    }

    async fn stop(&self) -> Result<bool> {
        if !self.is_alive().await {
            warn!(server = %self.node.name(), "already stopped");
            return Ok(true);
        }

        let t0 = Instant::now();
        let down = loop {
            self.service("stop").await?;
            if !self.is_alive().await {
                break true;
            }
            if t0.elapsed() > self.opts.max_start_wait() {
                break false;
            }
            sleep(self.opts.poll_interval()).await;
        };

        info!(
            server = %self.node.name(),
            elapsed_secs = t0.elapsed().as_secs_f64(),
            down,
            "stop finished"
        );
        Ok(down)
    }

    async fn is_alive(&self) -> bool {
        match self.service("ping").await {
            Ok(()) => true,
            Err(err) => {
                debug!(server = %self.node.name(), error = %err, "liveness probe negative");
                false
            }
        }
    }
}

/// One replicated key-value backend instance.
pub struct KvServer {
    inner: ScriptedServer,
}

impl KvServer {
    pub fn new(node: Node, cluster_name: impl Into<String>, config: &HarnessConfig) -> Self {
        Self {
            inner: ScriptedServer::new(
                node,
                cluster_name.into(),
                config,
                Scripts {
                    deploy: KV_DEPLOY_SCRIPT,
                    service: KV_SERVICE_SCRIPT,
                },
            ),
        }
    }

    pub fn node(&self) -> &Node {
        &self.inner.node
    }

    pub fn host(&self) -> &str {
        self.inner.node.host()
    }

    pub fn port(&self) -> u16 {
        self.inner.node.base_port()
    }
}

impl Lifecycle for KvServer {
    async fn deploy(&self) -> Result<()> {
        self.inner.deploy(&[]).await
    }

    async fn start(&self) -> Result<bool> {
        self.inner.start().await
    }

    async fn stop(&self) -> Result<bool> {
        self.inner.stop().await
    }

    async fn is_alive(&self) -> bool {
        self.inner.is_alive().await
    }
}

/// The cache proxy under test.
pub struct ProxyServer {
    inner: ScriptedServer,
    mbuf: u32,
    verbose: u8,
}

impl ProxyServer {
    pub fn new(node: Node, cluster_name: impl Into<String>, config: &HarnessConfig) -> Self {
        Self {
            inner: ScriptedServer::new(
                node,
                cluster_name.into(),
                config,
                Scripts {
                    deploy: PROXY_DEPLOY_SCRIPT,
                    service: PROXY_SERVICE_SCRIPT,
                },
            ),
            mbuf: config.scale.mbuf,
            verbose: config.logging.verbose,
        }
    }

    pub fn node(&self) -> &Node {
        &self.inner.node
    }

    pub fn host(&self) -> &str {
        self.inner.node.host()
    }

    /// Client-facing port.
    pub fn port(&self) -> u16 {
        self.inner.node.base_port()
    }

    /// Derived stats/admin port.
    pub fn stats_port(&self) -> u16 {
        self.inner.node.base_port() + STATS_PORT_OFFSET
    }
}

impl Lifecycle for ProxyServer {
    /// Deploys the proxy with its buffer-size and verbosity knobs appended
    /// to the common deploy arguments.
    async fn deploy(&self) -> Result<()> {
        self.inner
            .deploy(&[self.mbuf.to_string(), self.verbose.to_string()])
            .await
    }

    async fn start(&self) -> Result<bool> {
        self.inner.start().await
    }

    async fn stop(&self) -> Result<bool> {
        self.inner.stop().await
    }

    async fn is_alive(&self) -> bool {
        self.inner.is_alive().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_ports_derive_from_base() {
        let node = Node::new("proxy-4210", "127.0.0.1", 4210, "/tmp/r/proxy-4210");
        let proxy = ProxyServer::new(node, "ntest", &HarnessConfig::default());

        assert_eq!(proxy.port(), 4210);
        assert_eq!(proxy.stats_port(), 5210);
    }

    #[test]
    fn kv_server_exposes_node_identity() {
        let node = Node::new("kv-2210", "127.0.0.1", 2210, "/tmp/r/kv-2210");
        let server = KvServer::new(node, "ntest", &HarnessConfig::default());

        assert_eq!(server.host(), "127.0.0.1");
        assert_eq!(server.port(), 2210);
        assert_eq!(server.node().name(), "kv-2210");
    }
}
