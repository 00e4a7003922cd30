use iris_core::IrisError;
use thiserror::Error;

/// Result type for storage operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur while talking to an object store
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Checksum rejected for {bucket}/{key}: {reason}")]
    Integrity {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("No storage backend registered for scheme '{scheme}'")]
    UnknownScheme { scheme: String },

    #[error("Invalid object URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create a backend error from a message
    pub fn backend_msg<S: Into<String>>(message: S) -> Self {
        let message: String = message.into();
        Self::Backend {
            source: message.into(),
        }
    }

    pub fn integrity<B, K, R>(bucket: B, key: K, reason: R) -> Self
    where
        B: Into<String>,
        K: Into<String>,
        R: Into<String>,
    {
        Self::Integrity {
            bucket: bucket.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found<B: Into<String>, K: Into<String>>(bucket: B, key: K) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn invalid_url<U: Into<String>, R: Into<String>>(url: U, reason: R) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<BlobError> for IrisError {
    fn from(err: BlobError) -> Self {
        let message = err.to_string();
        match err {
            BlobError::Integrity { .. } => IrisError::integrity(message).with_source(err),
            BlobError::InvalidUrl { .. } => IrisError::internal(message).with_source(err),
            _ => IrisError::backend(message).with_source(err),
        }
    }
}
