//! Client-side error types.

use thiserror::Error;

/// Errors surfaced by backend connections and the helpers over them.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Connectivity-level failure expected to clear once a new path to the
    /// backend is established (mid-failover, node restarting).
    #[error("transient connectivity failure: {0}")]
    Transient(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend answered, but with an error.
    #[error("backend error: {0}")]
    Backend(String),

    /// An intentionally diverged write was resolved by the store instead of
    /// surfacing siblings.
    #[error("expected siblings for key {0}, but the store resolved them")]
    SiblingsResolved(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
