use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream as AwsByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use iris_core::S3BackendConfig;

use crate::checksum::Checksum;
use crate::{BlobError, BlobResult, ObjectStore, ObjectUrl, WriteReceipt};

/// Error codes S3-compatible services return when the sent checksum does
/// not match what they received.
const INTEGRITY_CODES: &[&str] = &["BadDigest", "InvalidDigest", "XAmzContentChecksumMismatch"];

const NOT_FOUND_CODES: &[&str] = &["NoSuchKey", "NotFound"];

/// S3-compatible backend (AWS S3, RustFS, MinIO, GCS interop).
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
}

impl S3CompatibleStore {
    pub const SCHEME: &'static str = "s3";

    pub async fn connect(config: &S3BackendConfig) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                id.clone(),
                secret.clone(),
                None,
                None,
                "iris-config",
            ));
        }

        let shared = loader.load().await;
        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&shared)
                .force_path_style(config.force_path_style)
                .build(),
        );

        tracing::info!(
            region = %config.region,
            endpoint = config.endpoint_url.as_deref().unwrap_or("default"),
            "s3 store ready"
        );
        Self { client }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn is_integrity_failure(code: Option<&str>) -> bool {
    code.is_some_and(|c| INTEGRITY_CODES.contains(&c))
}

fn is_not_found(code: Option<&str>, status: Option<u16>) -> bool {
    code.is_some_and(|c| NOT_FOUND_CODES.contains(&c)) || status == Some(404)
}

#[async_trait]
impl ObjectStore for S3CompatibleStore {
    fn scheme(&self) -> &'static str {
        Self::SCHEME
    }

    async fn write(&self, bucket: &str, key: &str, payload: Bytes) -> BlobResult<WriteReceipt> {
        let checksum = Checksum::of(&payload).to_base64();
        let size_bytes = payload.len() as u64;

        let result = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(size_bytes as i64)
            .checksum_crc32_c(checksum.clone())
            .body(AwsByteStream::from(payload))
            .send()
            .await;

        match result {
            Ok(output) => {
                let mut receipt =
                    WriteReceipt::new(ObjectUrl::new(Self::SCHEME, bucket, key), size_bytes, checksum);
                if let Some(etag) = output.e_tag() {
                    receipt = receipt.with_etag(etag);
                }
                Ok(receipt)
            }
            Err(err) => {
                let code = err.code().map(str::to_owned);
                if is_integrity_failure(code.as_deref()) {
                    let reason = err
                        .message()
                        .map(str::to_owned)
                        .or(code)
                        .unwrap_or_else(|| "checksum mismatch".to_string());
                    return Err(BlobError::integrity(bucket, key, reason));
                }
                Err(BlobError::backend(err))
            }
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> BlobResult<()> {
        let result = self.client.delete_object().bucket(bucket).key(key).send().await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let status = err.raw_response().map(|r| r.status().as_u16());
                if is_not_found(err.code(), status) {
                    tracing::debug!(bucket, key, "delete of missing object treated as success");
                    return Ok(());
                }
                Err(BlobError::backend(err))
            }
        }
    }
}
