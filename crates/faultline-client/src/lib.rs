//! Client-side helpers for driving and verifying the system under test.
//!
//! - Fan-out verification over independent KV backends ([`AggregateClient`])
//! - The eventually-consistent object-store seam and sibling helpers
//! - Retry combinators masking transient connectivity failures and
//!   replication lag ([`retry_write`], [`retry_read`], [`retry_read_until`])
//!
//! Wire protocols are external collaborators: everything here works through
//! the [`KvConnection`] and [`ObjectStore`] traits.

pub mod aggregate;
pub mod error;
pub mod object;
pub mod retry;

pub use aggregate::{AggregateClient, KvConnection};
pub use error::{ClientError, Result};
pub use object::{
    BucketProps, CausalContext, ObjectStore, StoredObject, create_siblings, ensure_sibling_props,
};
pub use retry::{RetryPolicy, retry_read, retry_read_until, retry_write};
