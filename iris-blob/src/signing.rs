//! HMAC-SHA256 signatures for public asset paths.
//!
//! `signature = base64url_nopad(HMAC-SHA256(secret, salt || path))`

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SALT_ENV: &str = "ONEIMAGE__SALT_KEY";
pub const SECRET_ENV: &str = "ONEIMAGE__SECRET_KEY";

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("{name} is not valid hex: {source}")]
    InvalidHex {
        name: &'static str,
        #[source]
        source: hex::FromHexError,
    },
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

#[derive(Clone)]
pub struct UrlSigner {
    keyed: HmacSha256,
    salt: Vec<u8>,
}

impl UrlSigner {
    pub fn new(secret: &[u8], salt: &[u8]) -> Result<Self, SigningError> {
        let keyed = HmacSha256::new_from_slice(secret)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self {
            keyed,
            salt: salt.to_vec(),
        })
    }

    pub fn from_hex(secret_hex: &str, salt_hex: &str) -> Result<Self, SigningError> {
        let secret = hex::decode(secret_hex).map_err(|source| SigningError::InvalidHex {
            name: SECRET_ENV,
            source,
        })?;
        let salt = hex::decode(salt_hex).map_err(|source| SigningError::InvalidHex {
            name: SALT_ENV,
            source,
        })?;
        Self::new(&secret, &salt)
    }

    /// `Ok(None)` unless both keys are set and non-empty. Malformed hex is an
    /// error so a misconfigured deployment never serves unsigned URLs.
    pub fn from_env() -> Result<Option<Self>, SigningError> {
        Self::from_values(std::env::var(SALT_ENV).ok(), std::env::var(SECRET_ENV).ok())
    }

    pub fn from_values(
        salt_hex: Option<String>,
        secret_hex: Option<String>,
    ) -> Result<Option<Self>, SigningError> {
        match (salt_hex, secret_hex) {
            (Some(salt), Some(secret)) if !salt.is_empty() && !secret.is_empty() => {
                Self::from_hex(&secret, &salt).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub fn signature(&self, path: &str) -> String {
        let mut mac = self.keyed.clone();
        mac.update(&self.salt);
        mac.update(path.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// The signature followed by `path`.
    pub fn sign_path(&self, path: &str) -> String {
        format!("{}{}", self.signature(path), path)
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}
