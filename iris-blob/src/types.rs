use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::BlobError;

/// Storage address of one object: `{scheme}://{bucket}/{key}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectUrl {
    pub scheme: String,
    pub bucket: String,
    pub key: String,
}

impl ObjectUrl {
    pub fn new<S, B, K>(scheme: S, bucket: B, key: K) -> Self
    where
        S: Into<String>,
        B: Into<String>,
        K: Into<String>,
    {
        Self {
            scheme: scheme.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

impl FromStr for ObjectUrl {
    type Err = BlobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| BlobError::invalid_url(s, "missing scheme"))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| BlobError::invalid_url(s, "missing object key"))?;
        if scheme.is_empty() || bucket.is_empty() || key.is_empty() {
            return Err(BlobError::invalid_url(s, "empty scheme, bucket or key"));
        }
        Ok(Self::new(scheme, bucket, key))
    }
}

/// One storage request, built per HTTP request and consumed once.
#[derive(Debug, Clone)]
pub enum StorageOperation {
    Write { target: ObjectUrl, payload: Bytes },
    Delete { target: ObjectUrl },
}

impl StorageOperation {
    pub fn target(&self) -> &ObjectUrl {
        match self {
            StorageOperation::Write { target, .. } | StorageOperation::Delete { target } => target,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            StorageOperation::Write { .. } => "PUT",
            StorageOperation::Delete { .. } => "DELETE",
        }
    }
}

/// What a backend reports after a successful write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub url: ObjectUrl,
    pub size_bytes: u64,
    /// CRC32C the backend verified, big-endian base64 as S3 expects it.
    pub checksum: String,
    pub etag: Option<String>,
    pub stored_at: i64,
}

impl WriteReceipt {
    pub fn new(url: ObjectUrl, size_bytes: u64, checksum: String) -> Self {
        Self {
            url,
            size_bytes,
            checksum,
            etag: None,
            stored_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

#[derive(Debug, Clone)]
pub enum StorageOutcome {
    Written(WriteReceipt),
    Deleted,
}
