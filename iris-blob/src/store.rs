use async_trait::async_trait;
use bytes::Bytes;

use crate::{BlobResult, WriteReceipt};

/// Object operations every storage backend implements.
///
/// A backend is registered under its scheme; the pipeline never names a
/// backend type directly.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Scheme this backend answers to, e.g. `s3`.
    fn scheme(&self) -> &'static str;

    /// Store `payload` at `bucket/key`. The backend must verify a CRC32C of
    /// the payload and fail with `Integrity` when it does not match.
    async fn write(&self, bucket: &str, key: &str, payload: Bytes) -> BlobResult<WriteReceipt>;

    /// Remove `bucket/key`. A missing object is not an error.
    async fn delete(&self, bucket: &str, key: &str) -> BlobResult<()>;
}
