use iris_core::IrisConfig;

use crate::{ObjectKeyStrategy, ObjectUrl, ShardedKeyStrategy, UrlSigner};

/// Builds storage addresses and public asset URLs for image identifiers.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    scheme: String,
    bucket: String,
    base_url: String,
    prefix: String,
    image_config: String,
    thumb_config: String,
    signer: Option<UrlSigner>,
}

impl UrlBuilder {
    pub fn from_config(config: &IrisConfig, signer: Option<UrlSigner>) -> Self {
        Self {
            scheme: config.server.storage.clone(),
            bucket: config.storage.bucket.clone(),
            base_url: config.storage.base_url.trim_end_matches('/').to_string(),
            prefix: config.storage.prefix.trim_matches('/').to_string(),
            image_config: config.storage.image_config.clone(),
            thumb_config: config.storage.thumb_config.clone(),
            signer,
        }
    }

    pub fn is_signing(&self) -> bool {
        self.signer.is_some()
    }

    pub fn object_key(&self, image_id: &str) -> String {
        ShardedKeyStrategy.object_key(image_id)
    }

    pub fn storage_url(&self, object_key: &str) -> ObjectUrl {
        ObjectUrl::new(&self.scheme, &self.bucket, object_key)
    }

    /// `/{config}/{prefix}/{key}`, the part covered by the signature.
    pub fn asset_path(&self, config_name: &str, object_key: &str) -> String {
        if self.prefix.is_empty() {
            format!("/{config_name}/{object_key}")
        } else {
            format!("/{config_name}/{}/{object_key}", self.prefix)
        }
    }

    /// `{base}/{signature}/{config}/{prefix}/{key}`, or without the signature
    /// segment when no signing keys are configured.
    pub fn public_url(&self, config_name: &str, object_key: &str) -> String {
        let path = self.asset_path(config_name, object_key);
        match &self.signer {
            Some(signer) => format!("{}/{}", self.base_url, signer.sign_path(&path)),
            None => format!("{}{}", self.base_url, path),
        }
    }

    pub fn image_url(&self, object_key: &str) -> String {
        self.public_url(&self.image_config, object_key)
    }

    pub fn thumb_url(&self, object_key: &str) -> String {
        self.public_url(&self.thumb_config, object_key)
    }
}
