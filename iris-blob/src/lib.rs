//! # iris-blob: object storage transport for Iris
//!
//! Uploads and deletes address objects as `{scheme}://{bucket}/{key}`. The
//! [`TransportRegistry`] maps each scheme to an [`ObjectStore`] backend,
//! built once at startup from the enabled backend sections.
//!
//! ```text
//! ┌─────────────────────┐
//! │   RequestPipeline   │  ← builds a StorageOperation
//! ├─────────────────────┤
//! │  TransportRegistry  │  ← dispatch by scheme
//! ├─────────────────────┤
//! │    ObjectStore      │  ← s3, memory, ...
//! └─────────────────────┘
//! ```
//!
//! Writes carry a CRC32C the backend verifies; deletes of missing objects
//! succeed. Object keys lead with a digest of the identifier so sequential
//! identifiers spread across the key space, and public URLs can carry an
//! HMAC signature of their path.
//!
//! ```rust
//! use std::sync::Arc;
//! use iris_blob::{MemoryStore, ObjectStore, ObjectUrl, TransportRegistry};
//!
//! # #[tokio::main]
//! # async fn main() -> iris_blob::BlobResult<()> {
//! let registry = TransportRegistry::builder()
//!     .register(Arc::new(MemoryStore::new()) as Arc<dyn ObjectStore>)
//!     .build();
//!
//! let target: ObjectUrl = "memory://photos/abc-1.jpg".parse()?;
//! registry.write(target.clone(), bytes::Bytes::from_static(b"...")).await?;
//! registry.delete(target).await?;
//! # Ok(())
//! # }
//! ```

pub mod checksum;
mod error;
mod keys;
mod memory_store;
mod registry;
mod s3_store;
mod signing;
pub mod store;
mod types;
mod urls;

pub use checksum::{Checksum, Crc32cHasher};
pub use error::{BlobError, BlobResult};
pub use keys::{ObjectKeyStrategy, ShardedKeyStrategy};
pub use memory_store::{Fault, MemoryStore};
pub use registry::{TransportRegistry, TransportRegistryBuilder};
pub use s3_store::S3CompatibleStore;
pub use signing::{SigningError, UrlSigner, SALT_ENV, SECRET_ENV};
pub use store::ObjectStore;
pub use types::{ObjectUrl, StorageOperation, StorageOutcome, WriteReceipt};
pub use urls::UrlBuilder;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobError, BlobResult, ObjectStore, ObjectUrl, StorageOperation, TransportRegistry, UrlBuilder,
        WriteReceipt,
    };
}
