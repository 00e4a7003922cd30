use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::{
    BlobError, BlobResult, ObjectStore, ObjectUrl, StorageOperation, StorageOutcome, WriteReceipt,
};

/// Scheme to backend map. Built once at startup and read-only afterwards.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    stores: HashMap<&'static str, Arc<dyn ObjectStore>>,
}

impl TransportRegistry {
    pub fn builder() -> TransportRegistryBuilder {
        TransportRegistryBuilder::default()
    }

    pub fn schemes(&self) -> Vec<&'static str> {
        let mut schemes: Vec<_> = self.stores.keys().copied().collect();
        schemes.sort_unstable();
        schemes
    }

    pub fn supports(&self, scheme: &str) -> bool {
        self.stores.contains_key(scheme)
    }

    fn resolve(&self, target: &ObjectUrl) -> BlobResult<&Arc<dyn ObjectStore>> {
        self.stores
            .get(target.scheme.as_str())
            .ok_or_else(|| BlobError::UnknownScheme {
                scheme: target.scheme.clone(),
            })
    }

    pub async fn execute(&self, op: StorageOperation) -> BlobResult<StorageOutcome> {
        let store = self.resolve(op.target())?;
        tracing::debug!(method = op.method(), target = %op.target(), "storage dispatch");

        match op {
            StorageOperation::Write { target, payload } => store
                .write(&target.bucket, &target.key, payload)
                .await
                .map(StorageOutcome::Written),
            StorageOperation::Delete { target } => {
                match store.delete(&target.bucket, &target.key).await {
                    Ok(()) | Err(BlobError::NotFound { .. }) => Ok(StorageOutcome::Deleted),
                    Err(e) => Err(e),
                }
            }
        }
    }

    pub async fn write(&self, target: ObjectUrl, payload: Bytes) -> BlobResult<WriteReceipt> {
        match self.execute(StorageOperation::Write { target, payload }).await? {
            StorageOutcome::Written(receipt) => Ok(receipt),
            StorageOutcome::Deleted => Err(BlobError::backend_msg("write reported a delete")),
        }
    }

    pub async fn delete(&self, target: ObjectUrl) -> BlobResult<()> {
        self.execute(StorageOperation::Delete { target }).await.map(|_| ())
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

#[derive(Default)]
pub struct TransportRegistryBuilder {
    stores: HashMap<&'static str, Arc<dyn ObjectStore>>,
}

impl TransportRegistryBuilder {
    /// Register a backend under its own scheme. A later registration for the
    /// same scheme replaces the earlier one.
    pub fn register(mut self, store: Arc<dyn ObjectStore>) -> Self {
        let scheme = store.scheme();
        if self.stores.insert(scheme, store).is_some() {
            tracing::warn!(scheme, "storage backend replaced");
        }
        self
    }

    pub fn build(self) -> TransportRegistry {
        TransportRegistry {
            stores: self.stores,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fault, MemoryStore};

    fn registry() -> (Arc<MemoryStore>, TransportRegistry) {
        let store = Arc::new(MemoryStore::new());
        let registry = TransportRegistry::builder()
            .register(store.clone() as Arc<dyn ObjectStore>)
            .build();
        (store, registry)
    }

    #[tokio::test]
    async fn dispatches_by_scheme() {
        let (store, registry) = registry();
        let target = ObjectUrl::new("memory", "photos", "abc-1.jpg");

        let receipt = registry
            .write(target.clone(), Bytes::from_static(b"payload"))
            .await
            .unwrap();
        assert_eq!(receipt.url, target);
        assert!(store.contains("photos", "abc-1.jpg"));

        registry.delete(target).await.unwrap();
        assert!(!store.contains("photos", "abc-1.jpg"));
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let (_, registry) = registry();
        let err = registry
            .write(ObjectUrl::new("gcs", "b", "k"), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::UnknownScheme { scheme } if scheme == "gcs"));
        assert_eq!(registry.schemes(), vec!["memory"]);
    }

    #[tokio::test]
    async fn integrity_failure_leaves_nothing_readable() {
        let (store, registry) = registry();
        store.inject_fault(Fault::CorruptInTransit);

        let err = registry
            .write(ObjectUrl::new("memory", "b", "k"), Bytes::from_static(b"abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::Integrity { .. }));
        assert!(store.get("b", "k").is_none());
    }

    #[tokio::test]
    async fn deleting_missing_object_succeeds() {
        let (_, registry) = registry();
        registry
            .delete(ObjectUrl::new("memory", "b", "never-written"))
            .await
            .unwrap();
    }
}
