//! iris-core: the transport-agnostic engines behind the Iris gateway.
//!
//! Nothing in here knows about HTTP or a particular object store. The
//! server crates compose these pieces into a request pipeline.

pub mod config;
pub mod errors;
pub mod id;
pub mod image;
pub mod options;
pub mod pool;
pub mod transform;

pub use config::{
    ConfigError, ImageConfig, IrisConfig, MemoryBackendConfig, S3BackendConfig, ServerConfig,
    StorageBackendConfig, StorageConfig,
};
pub use errors::{ErrorKind, IrisError, IrisResult};
pub use id::{IdGenerator, IdParts, SystemClock, TimeSource};
pub use image::{DimensionLimits, ImageFormat, ImageHeader, ProbeError};
pub use options::{Gravity, GravityType, ProcessingOptions, ResizeType, Rgb, WatermarkOptions};
pub use pool::{BufferPool, PoolAggregate, PoolSettings, PoolStats, PooledBuffer};
pub use transform::{Passthrough, TransformError, Transformer};
