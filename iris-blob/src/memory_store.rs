use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::checksum::Checksum;
use crate::{BlobError, BlobResult, ObjectStore, ObjectUrl, WriteReceipt};

/// Faults the in-memory backend can be told to inject on the next write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Flip one byte after the client checksum was computed.
    CorruptInTransit,
    /// Fail the request as if the backend were down.
    Unavailable,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    checksum: Checksum,
}

/// Process-local backend under the `memory` scheme. Verifies checksums the
/// way a real object store does, which makes it usable in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
    fault: Mutex<Option<Fault>>,
}

impl MemoryStore {
    pub const SCHEME: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fault for the next write only.
    pub fn inject_fault(&self, fault: Fault) {
        *self.fault.lock() = Some(fault);
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.clone())
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.get(bucket, key).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .read()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn scheme(&self) -> &'static str {
        Self::SCHEME
    }

    async fn write(&self, bucket: &str, key: &str, payload: Bytes) -> BlobResult<WriteReceipt> {
        let sent = Checksum::of(&payload);

        let fault = self.fault.lock().take();
        let received = match fault {
            Some(Fault::Unavailable) => {
                return Err(BlobError::backend_msg("memory store unavailable"));
            }
            Some(Fault::CorruptInTransit) if !payload.is_empty() => {
                let mut corrupted = payload.to_vec();
                corrupted[0] ^= 0xFF;
                Bytes::from(corrupted)
            }
            _ => payload,
        };

        // server side: verify before the object becomes visible
        let actual = Checksum::of(&received);
        if actual != sent {
            return Err(BlobError::integrity(
                bucket,
                key,
                format!("expected crc32c {}, computed {}", sent.to_base64(), actual.to_base64()),
            ));
        }

        let size_bytes = received.len() as u64;
        self.objects.write().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: received,
                checksum: actual,
            },
        );

        Ok(WriteReceipt::new(
            ObjectUrl::new(Self::SCHEME, bucket, key),
            size_bytes,
            actual.to_base64(),
        ))
    }

    async fn delete(&self, bucket: &str, key: &str) -> BlobResult<()> {
        let removed = self
            .objects
            .write()
            .remove(&(bucket.to_string(), key.to_string()));
        if removed.is_none() {
            tracing::debug!(bucket, key, "delete of missing object treated as success");
        }
        Ok(())
    }
}

impl MemoryStore {
    /// Checksum recorded when the object was stored.
    pub fn stored_checksum(&self, bucket: &str, key: &str) -> Option<u32> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.checksum.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_back() {
        let store = MemoryStore::new();
        let receipt = store
            .write("photos", "k1", Bytes::from_static(b"image-bytes"))
            .await
            .unwrap();

        assert_eq!(receipt.size_bytes, 11);
        assert_eq!(receipt.url.to_string(), "memory://photos/k1");
        assert_eq!(store.get("photos", "k1").unwrap(), Bytes::from_static(b"image-bytes"));
        assert_eq!(
            store.stored_checksum("photos", "k1"),
            Some(crc32c::crc32c(b"image-bytes"))
        );
    }

    #[tokio::test]
    async fn corrupted_payload_is_rejected_and_not_stored() {
        let store = MemoryStore::new();
        store.inject_fault(Fault::CorruptInTransit);

        let err = store
            .write("photos", "k1", Bytes::from_static(b"image-bytes"))
            .await
            .unwrap_err();

        assert!(matches!(err, BlobError::Integrity { .. }), "{err}");
        assert!(!store.contains("photos", "k1"));

        // fault is one-shot
        store
            .write("photos", "k1", Bytes::from_static(b"image-bytes"))
            .await
            .unwrap();
        assert!(store.contains("photos", "k1"));
    }

    #[tokio::test]
    async fn unavailable_is_a_backend_error() {
        let store = MemoryStore::new();
        store.inject_fault(Fault::Unavailable);
        let err = store.write("b", "k", Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, BlobError::Backend { .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.write("b", "k", Bytes::from_static(b"x")).await.unwrap();
        store.delete("b", "k").await.unwrap();
        assert!(!store.contains("b", "k"));
        store.delete("b", "k").await.unwrap();
        store.delete("b", "never-existed").await.unwrap();
    }
}
