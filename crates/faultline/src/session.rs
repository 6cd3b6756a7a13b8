//! Test-session topology and scenario-level lifecycle helpers.
//!
//! A [`Topology`] is built once from static test configuration and handed
//! into a [`TestSession`]; the session owns every controller and is driven
//! by exactly one scenario task. There are no process-wide singletons —
//! two sessions never share state (though they must not address the same
//! physical cluster concurrently).

use anyhow::{Context, bail, ensure};
use faultline_cluster::{KvServer, Lifecycle, Node, ProxyServer, StoreCluster};
use faultline_config::HarnessConfig;
use tracing::{info, warn};

/// Static description of the system under test: the proxy, its replicated-KV
/// backends, and the distributed-store cluster behind the write-through path.
#[derive(Debug, Clone)]
pub struct Topology {
    pub cluster_name: String,
    pub proxy: Node,
    pub kv_nodes: Vec<Node>,
    pub store_nodes: Vec<Node>,
}

/// Owns the lifecycle controllers for one scenario run.
pub struct TestSession {
    config: HarnessConfig,
    proxy: ProxyServer,
    kv_servers: Vec<KvServer>,
    store: StoreCluster,
}

impl TestSession {
    pub fn new(topology: Topology, config: HarnessConfig) -> Self {
        let proxy = ProxyServer::new(topology.proxy, topology.cluster_name.clone(), &config);
        let kv_servers = topology
            .kv_nodes
            .into_iter()
            .map(|node| KvServer::new(node, topology.cluster_name.clone(), &config))
            .collect();
        let store = StoreCluster::new(
            format!("{}-store", topology.cluster_name),
            topology.store_nodes,
            &config,
        );

        Self {
            config,
            proxy,
            kv_servers,
            store,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn proxy(&self) -> &ProxyServer {
        &self.proxy
    }

    pub fn kv_servers(&self) -> &[KvServer] {
        &self.kv_servers
    }

    pub fn store(&self) -> &StoreCluster {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StoreCluster {
        &mut self.store
    }

    /// Brings the whole system under test into a known-good state: the store
    /// cluster first (the proxy needs it formed), then each KV backend, then
    /// the proxy, then bucket-type provisioning.
    pub async fn setup(&mut self) -> anyhow::Result<()> {
        info!(
            mbuf = self.config.scale.mbuf,
            verbose = self.config.logging.verbose,
            "setting up test session"
        );

        self.store.deploy().await.context("deploying store cluster")?;
        if !self.store.start().await.context("starting store cluster")? {
            bail!("store cluster did not come up within the start wait");
        }

        for server in &self.kv_servers {
            server.deploy().await.context("deploying KV backend")?;
            server.stop().await.context("resetting KV backend")?;
            if !server.start().await.context("starting KV backend")? {
                bail!("KV backend {} did not come up", server.node().name());
            }
        }

        self.proxy.deploy().await.context("deploying proxy")?;
        self.proxy.stop().await.context("resetting proxy")?;
        if !self.proxy.start().await.context("starting proxy")? {
            bail!("proxy {} did not come up", self.proxy.node().name());
        }

        self.store.ensure_string_dt().await?;
        self.store.ensure_set_dt().await?;
        Ok(())
    }

    /// Stops everything, proxy first. Backends that already died mid-scenario
    /// are reported but still swept.
    pub async fn teardown(&mut self) -> anyhow::Result<()> {
        if !self.proxy.is_alive().await {
            warn!(proxy = %self.proxy.node().name(), "proxy was not alive at teardown");
        }
        self.proxy.stop().await.context("stopping proxy")?;

        if !self.store.is_alive().await {
            warn!(cluster = %self.store.name(), "store cluster was not alive at teardown");
        }
        self.store.stop().await.context("stopping store cluster")?;

        for server in &self.kv_servers {
            if !server.is_alive().await {
                warn!(server = %server.node().name(), "KV backend was not alive at teardown");
            }
            server.stop().await.context("stopping KV backend")?;
        }
        Ok(())
    }

    /// Stops the first `count` KV backends to simulate a partial outage.
    pub async fn shutdown_kv_nodes(&mut self, count: usize) -> anyhow::Result<()> {
        ensure!(
            count <= self.kv_servers.len(),
            "cannot shut down {count} of {} KV backends",
            self.kv_servers.len()
        );

        for server in &self.kv_servers[..count] {
            server.stop().await.context("shutting down KV backend")?;
        }
        Ok(())
    }

    /// Restarts every KV backend, whether or not it was shut down.
    pub async fn restore_kv_nodes(&mut self) -> anyhow::Result<()> {
        for server in &self.kv_servers {
            if !server.start().await.context("restoring KV backend")? {
                bail!("KV backend {} did not come back", server.node().name());
            }
        }
        Ok(())
    }

    /// Shuts down the last `count` store nodes, recording them for
    /// [`TestSession::restore_store_nodes`].
    pub async fn shutdown_store_nodes(&mut self, count: usize) -> anyhow::Result<()> {
        let names = self.store.node_names();
        ensure!(
            count <= names.len(),
            "cannot shut down {count} of {} store nodes",
            names.len()
        );

        if count > 0 {
            self.store
                .shutdown(&names[names.len() - count..])
                .await
                .context("shutting down store nodes")?;
        }
        Ok(())
    }

    /// Restores every previously shut-down store node; `Ok(true)` once the
    /// cluster is back up. Must be paired with the preceding shutdown calls
    /// so no partially-partitioned cluster leaks into later scenarios.
    pub async fn restore_store_nodes(&mut self) -> anyhow::Result<bool> {
        self.store.restore().await.context("restoring store nodes")
    }
}
