//! faultline — integration-test harness for a caching proxy layer.
//!
//! Exercises a cache proxy in front of a replicated key-value backend and an
//! eventually-consistent distributed store, with the machinery the
//! assertions ride on:
//! - multi-node cluster lifecycle control over black-box deployment scripts
//! - partial-failure injection (shut down a node subset, restore exactly
//!   that subset)
//! - consistency-aware retries masking transient connectivity failures and
//!   replication lag
//!
//! The crates compose bottom-up: `faultline-config` (scalar knobs),
//! `faultline-cluster` (lifecycle and fault injection), `faultline-client`
//! (fan-out verification and retries), and this facade with the
//! session/topology layer scenarios start from.

pub mod keys;
pub mod session;

pub use faultline_cluster::{
    CommandRunner, Error, KvServer, Lifecycle, Node, ProxyServer, StoreCluster,
};
pub use faultline_client::{
    AggregateClient, ClientError, KvConnection, ObjectStore, RetryPolicy, create_siblings,
    ensure_sibling_props, retry_read, retry_read_until, retry_write,
};
pub use faultline_config::HarnessConfig;
pub use keys::{distinct_key, distinct_value, namespaced_key};
pub use session::{TestSession, Topology};
