//! The pixel transform seam.
//!
//! Iris does not decode or encode pixels itself. A [`Transformer`] takes the
//! validated source bytes and the shared [`ProcessingOptions`] and returns
//! the bytes to store.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::errors::IrisError;
use crate::image::{ImageFormat, ImageHeader};
use crate::options::ProcessingOptions;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("cannot decode {format} source: {reason}")]
    Decode { format: ImageFormat, reason: String },

    #[error("cannot encode {format}: {reason}")]
    Encode { format: ImageFormat, reason: String },

    #[error("transformer has been shut down")]
    ShutDown,
}

impl From<TransformError> for IrisError {
    fn from(err: TransformError) -> Self {
        IrisError::processing(err.to_string()).with_source(err)
    }
}

#[async_trait]
pub trait Transformer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transform(
        &self,
        source: &[u8],
        header: &ImageHeader,
        options: &ProcessingOptions,
    ) -> Result<Bytes, TransformError>;

    /// Release native resources. Called once, after the server drained.
    async fn shutdown(&self) {}
}

/// Stores the source unchanged.
#[derive(Debug, Default)]
pub struct Passthrough {
    closed: AtomicBool,
}

impl Passthrough {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transformer for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    async fn transform(
        &self,
        source: &[u8],
        _header: &ImageHeader,
        _options: &ProcessingOptions,
    ) -> Result<Bytes, TransformError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransformError::ShutDown);
        }
        Ok(Bytes::copy_from_slice(source))
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        tracing::debug!("passthrough transformer closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn header() -> ImageHeader {
        ImageHeader {
            format: ImageFormat::Png,
            width: 1,
            height: 1,
        }
    }

    #[tokio::test]
    async fn passthrough_returns_source() {
        let t = Passthrough::new();
        let out = t
            .transform(b"abc", &header(), &ProcessingOptions::default())
            .await
            .unwrap();
        assert_eq!(&out[..], b"abc");
    }

    #[tokio::test]
    async fn refuses_work_after_shutdown() {
        let t = Passthrough::new();
        t.shutdown().await;
        let err = t
            .transform(b"abc", &header(), &ProcessingOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::ShutDown));
        assert_eq!(IrisError::from(err).kind, ErrorKind::ProcessingError);
    }
}
