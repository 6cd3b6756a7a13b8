//! Error types for cluster control.

use thiserror::Error;

/// Cluster control errors.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A control script failed after exhausting its retry budget.
    #[error("script {script} against [{targets}] failed after {attempts} attempts: {reason}")]
    Execution {
        script: String,
        targets: String,
        attempts: u32,
        reason: String,
    },

    /// Bucket-type creation or activation did not report success.
    #[error("provisioning bucket type {bucket_type} failed at {step}: {reason}")]
    Provisioning {
        bucket_type: String,
        step: &'static str,
        reason: String,
    },

    /// A node name outside the cluster's membership was addressed.
    #[error("node {node} is not a member of cluster {cluster}")]
    UnknownNode { cluster: String, node: String },

    /// A cluster that must be up could not be brought up.
    #[error("cluster {cluster} did not come up within {waited_secs}s")]
    NotAlive { cluster: String, waited_secs: u64 },
}

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;
