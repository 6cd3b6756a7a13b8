//! Cluster lifecycle and fault-injection control for integration tests.
//!
//! Drives backend clusters under test as black boxes through external
//! control scripts:
//! - Deploy/start/stop with liveness polling and wall-clock bounds
//! - Partial-failure injection: shut down a node subset, later restore
//!   exactly that subset
//! - Bounded-retry execution of control commands with an append-only
//!   invocation log
//! - Idempotent bucket-type provisioning against the canonical node
//!
//! Every controller is owned and driven by one scenario task at a time;
//! concurrent scenarios against the same physical cluster must be serialized
//! externally.

pub mod command;
pub mod error;
pub mod node;
pub mod server;
pub mod store;

pub use command::CommandRunner;
pub use error::{Error, Result};
pub use node::{HTTP_PORT_OFFSET, Node};
pub use server::{KvServer, ProxyServer, STATS_PORT_OFFSET};
pub use store::StoreCluster;

/// The capability set every backend variant exposes to scenarios.
///
/// One method set, separate concrete types per backend ([`StoreCluster`],
/// [`KvServer`], [`ProxyServer`]) — polymorphism over capabilities, not a
/// type hierarchy.
#[allow(async_fn_in_trait)]
pub trait Lifecycle {
    /// Materializes runnable on-disk artifacts. Implies nothing about
    /// liveness; idempotent at the filesystem level.
    async fn deploy(&self) -> Result<()>;

    /// Brings the backend up, polling until alive or a wall-clock bound.
    /// `Ok(false)` means the liveness timeout elapsed — callers must check.
    async fn start(&self) -> Result<bool>;

    /// Takes the backend down, polling until the probe reports down or a
    /// wall-clock bound. `Ok(false)` means the timeout elapsed.
    async fn stop(&self) -> Result<bool>;

    /// Lightweight liveness probe. Probe failures of any kind read as
    /// "not alive"; probing never crashes the caller.
    async fn is_alive(&self) -> bool;
}
