//! Fan-out over independent replicated-KV backend connections.
//!
//! The proxy under test fans writes out to non-clustered backends itself;
//! [`AggregateClient`] mirrors that from the verification side so scenarios
//! can observe every replica directly, independent of the proxy.

use crate::Result;

/// One independent replicated-KV backend connection. The wire protocol is an
/// external collaborator; scenarios plug in a concrete client, tests plug in
/// fakes.
#[allow(async_fn_in_trait)]
pub trait KvConnection {
    /// Returns the value for `key`, or `None` when the backend reports it
    /// absent.
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Deletes `key`, returning the number of entries removed (0 or 1).
    async fn delete(&mut self, key: &str) -> Result<u64>;
}

/// Stateless fan-out over an ordered list of backend connections, mirroring
/// cluster node order.
pub struct AggregateClient<C> {
    connections: Vec<C>,
}

impl<C: KvConnection> AggregateClient<C> {
    pub fn new(connections: Vec<C>) -> Self {
        Self { connections }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Deletes `key` from every backend unconditionally and returns the sum
    /// of per-node deletion counts. Connection errors propagate.
    pub async fn delete_everywhere(&mut self, key: &str) -> Result<u64> {
        let mut removed = 0;
        for connection in &mut self.connections {
            removed += connection.delete(key).await?;
        }
        Ok(removed)
    }

    /// Queries backends in order and returns the first non-absent value,
    /// short-circuiting. `Ok(None)` only when every backend reports absent;
    /// connection errors propagate.
    pub async fn first_hit_get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        for connection in &mut self.connections {
            if let Some(value) = connection.get(key).await? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}
