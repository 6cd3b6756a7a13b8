//! Eventually-consistent object-store seam and sibling helpers.
//!
//! The distributed store keeps conflicting concurrent writes visible as
//! siblings when its bucket allows multiple values. Scenarios need both to
//! provision that behavior idempotently and to manufacture sibling conflicts
//! on demand; the store's wire protocol itself stays an external
//! collaborator behind [`ObjectStore`].

use crate::{ClientError, Result};
use tracing::debug;

/// Opaque causal context returned by a fetch and handed back on store.
/// Writing with a stale context is what produces siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CausalContext(pub Vec<u8>);

/// A fetched object: resolved data, any unresolved sibling values, and the
/// causal context for subsequent writes.
#[derive(Debug, Clone, Default)]
pub struct StoredObject {
    pub data: Option<Vec<u8>>,
    pub siblings: Vec<Vec<u8>>,
    pub context: Option<CausalContext>,
}

/// Bucket properties governing conflict handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketProps {
    pub allow_mult: bool,
    pub last_write_wins: bool,
}

/// Narrow object-store operations consumed by the harness.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    async fn fetch(&mut self, key: &str) -> Result<StoredObject>;

    /// Stores `data` under `key`. A missing or stale `context` makes the
    /// write concurrent from the store's point of view.
    async fn store(&mut self, key: &str, data: &[u8], context: Option<&CausalContext>)
    -> Result<()>;

    async fn delete(&mut self, key: &str) -> Result<()>;

    async fn bucket_props(&mut self) -> Result<BucketProps>;

    async fn set_bucket_props(&mut self, props: BucketProps) -> Result<()>;
}

/// Idempotently forces the bucket into sibling-surfacing mode
/// (`allow_mult = true`, `last_write_wins = false`), verifying the
/// read-back when a change was needed.
pub async fn ensure_sibling_props<S: ObjectStore>(store: &mut S) -> Result<()> {
    let props = store.bucket_props().await?;
    if props.allow_mult && !props.last_write_wins {
        debug!("bucket already surfaces siblings");
        return Ok(());
    }

    store
        .set_bucket_props(BucketProps {
            allow_mult: true,
            last_write_wins: false,
        })
        .await?;

    let readback = store.bucket_props().await?;
    if !readback.allow_mult || readback.last_write_wins {
        return Err(ClientError::Backend(
            "sibling bucket properties did not apply".to_string(),
        ));
    }
    Ok(())
}

/// Manufactures a sibling conflict under `key` by issuing two stores of
/// distinct values from the same (stale) causal context, then verifies the
/// read-back actually observes the divergence.
pub async fn create_siblings<S: ObjectStore>(
    store: &mut S,
    key: &str,
    first: &[u8],
    second: &[u8],
) -> Result<()> {
    if first == second {
        return Err(ClientError::Backend(
            "sibling values must be distinct".to_string(),
        ));
    }

    ensure_sibling_props(store).await?;

    let one = store.fetch(key).await?;
    let two = store.fetch(key).await?;
    store.store(key, first, one.context.as_ref()).await?;
    store.store(key, second, two.context.as_ref()).await?;

    let readback = store.fetch(key).await?;
    if readback.siblings.len() < 2 {
        return Err(ClientError::SiblingsResolved(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Minimal vector-clock-free model of an allow-mult store: a write whose
    /// context is not the current version lands as a sibling.
    struct FakeStore {
        props: BucketProps,
        objects: HashMap<String, (u64, Vec<Vec<u8>>)>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                props: BucketProps {
                    allow_mult: false,
                    last_write_wins: true,
                },
                objects: HashMap::new(),
            }
        }
    }

    impl ObjectStore for FakeStore {
        async fn fetch(&mut self, key: &str) -> Result<StoredObject> {
            let (version, values) = self.objects.get(key).cloned().unwrap_or((0, Vec::new()));
            Ok(StoredObject {
                data: values.first().cloned(),
                siblings: if values.len() > 1 { values } else { Vec::new() },
                context: Some(CausalContext(version.to_be_bytes().to_vec())),
            })
        }

        async fn store(
            &mut self,
            key: &str,
            data: &[u8],
            context: Option<&CausalContext>,
        ) -> Result<()> {
            let entry = self.objects.entry(key.to_string()).or_insert((0, Vec::new()));
            let current = CausalContext(entry.0.to_be_bytes().to_vec());
            let stale = context != Some(&current);

            if stale && self.props.allow_mult && !entry.1.is_empty() {
                entry.1.push(data.to_vec());
            } else {
                entry.1 = vec![data.to_vec()];
            }
            entry.0 += 1;
            Ok(())
        }

        async fn delete(&mut self, key: &str) -> Result<()> {
            self.objects.remove(key);
            Ok(())
        }

        async fn bucket_props(&mut self) -> Result<BucketProps> {
            Ok(self.props)
        }

        async fn set_bucket_props(&mut self, props: BucketProps) -> Result<()> {
            self.props = props;
            Ok(())
        }
    }

    #[tokio::test]
    async fn ensure_sibling_props_flips_and_verifies() {
        let mut store = FakeStore::new();

        ensure_sibling_props(&mut store).await.unwrap();

        assert!(store.props.allow_mult);
        assert!(!store.props.last_write_wins);
    }

    #[tokio::test]
    async fn ensure_sibling_props_is_a_noop_when_already_set() {
        let mut store = FakeStore::new();
        store.props = BucketProps {
            allow_mult: true,
            last_write_wins: false,
        };

        ensure_sibling_props(&mut store).await.unwrap();
        assert!(store.props.allow_mult);
    }

    #[tokio::test]
    async fn create_siblings_observes_the_divergence() {
        let mut store = FakeStore::new();
        store.store("k", b"seed", None).await.unwrap();

        create_siblings(&mut store, "k", b"left", b"right")
            .await
            .unwrap();

        let object = store.fetch("k").await.unwrap();
        assert!(object.siblings.len() >= 2);
    }

    #[tokio::test]
    async fn identical_sibling_values_are_rejected() {
        let mut store = FakeStore::new();

        let err = create_siblings(&mut store, "k", b"same", b"same")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Backend(_)));
    }

    #[tokio::test]
    async fn a_resolving_store_is_reported() {
        let mut store = FakeStore::new();
        store.store("k", b"seed", None).await.unwrap();

        // a store that ignores allow_mult and always resolves
        struct Resolving(FakeStore);
        impl ObjectStore for Resolving {
            async fn fetch(&mut self, key: &str) -> Result<StoredObject> {
                let mut object = self.0.fetch(key).await?;
                object.siblings.clear();
                Ok(object)
            }
            async fn store(
                &mut self,
                key: &str,
                data: &[u8],
                context: Option<&CausalContext>,
            ) -> Result<()> {
                self.0.store(key, data, context).await
            }
            async fn delete(&mut self, key: &str) -> Result<()> {
                self.0.delete(key).await
            }
            async fn bucket_props(&mut self) -> Result<BucketProps> {
                self.0.bucket_props().await
            }
            async fn set_bucket_props(&mut self, props: BucketProps) -> Result<()> {
                self.0.set_bucket_props(props).await
            }
        }

        let err = create_siblings(&mut Resolving(store), "k", b"left", b"right")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::SiblingsResolved(_)));
    }
}
