//! # Configuration
//!
//! Iris reads one TOML file at startup, lets the environment override any
//! key, fills in derived defaults and validates the result. The outcome is
//! an immutable [`IrisConfig`] that is shared read-only by every request.
//!
//! ## Environment overrides
//! Variables use a `ONEIMAGE__` prefix and double underscores between
//! path segments:
//!
//! ```bash
//! export ONEIMAGE__SERVER__PORT=9090          # server.port
//! export ONEIMAGE__IMAGE__MIN_DIMENSION=120   # image.min_dimension
//! export ONEIMAGE__STORAGE__S3__REGION=eu-west-1
//! ```
//!
//! Single-segment variables such as `ONEIMAGE__SALT_KEY` are secrets and
//! never touch the file-backed configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::image::ImageFormat;
use crate::pool::PoolAggregate;

pub const ENV_PREFIX: &str = "ONEIMAGE__";

/// Older deployments name the server section `one_image`.
const LEGACY_SERVER_SECTION: &str = "one_image";

/// Locations probed, in order, when no explicit path is given.
pub const SEARCH_PATHS: &[&str] = &["config.toml", "config/config.toml", "/app/config.toml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no configuration file found (searched: {searched})")]
    NotFound { searched: String },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {source}")]
    Parse {
        #[from]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IrisConfig {
    pub server: ServerConfig,
    pub image: ImageConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on concurrently served requests. 0 means `10 * concurrency`.
    pub max_conns: usize,
    /// Scheme of the storage backend uploads are written to.
    pub storage: String,
    /// 0 means twice the number of CPUs.
    pub concurrency: usize,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub free_mem_interval: Duration,
    pub log_mem_stats: bool,
    pub max_file_size: u64,
    pub upload_buffer_size: usize,
    pub buffer_pool_calib_threshold: usize,
    pub buffer_pool_aggregate: PoolAggregate,
    /// Released buffers larger than `target * (1 + tolerance)` are dropped.
    pub buffer_pool_tolerance: f64,
    /// Return internal error messages to clients.
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_conns: 0,
            storage: "s3".to_string(),
            concurrency: 0,
            timeout: Duration::from_secs(30),
            free_mem_interval: Duration::from_secs(60),
            log_mem_stats: false,
            max_file_size: 10 * 1024 * 1024, // 10MB
            upload_buffer_size: 1024 * 1024,
            buffer_pool_calib_threshold: 1024,
            buffer_pool_aggregate: PoolAggregate::Max,
            buffer_pool_tolerance: 0.5,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    /// Output format of the transform step.
    #[serde(rename = "type")]
    pub format: String,
    /// 0 disables the bound.
    pub max_dimension: u32,
    /// 0 disables the bound.
    pub min_dimension: u32,
    /// Maximum `width * height`. 0 disables the bound.
    pub max_resolution: u64,
    pub jpeg_progressive: bool,
    pub png_interlaced: bool,
    pub watermark_opacity: f64,
    pub max_gif_frames: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            quality: 85,
            format: "jpg".to_string(),
            max_dimension: 10_000,
            min_dimension: 240,
            max_resolution: 50_000_000,
            jpeg_progressive: true,
            png_interlaced: false,
            watermark_opacity: 1.0,
            max_gif_frames: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: String,
    /// Public host serving processed images.
    pub base_url: String,
    /// Path segment between the config name and the object key.
    pub prefix: String,
    pub image_config: String,
    pub thumb_config: String,
    /// Extension appended to generated identifiers.
    pub format: String,
    pub s3: S3BackendConfig,
    pub memory: MemoryBackendConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            base_url: "http://localhost:8081".to_string(),
            prefix: "images".to_string(),
            image_config: "default".to_string(),
            thumb_config: "thumb".to_string(),
            format: "jpg".to_string(),
            s3: S3BackendConfig::default(),
            memory: MemoryBackendConfig::default(),
        }
    }
}

/// S3-compatible backend. Credentials fall back to the SDK default chain
/// when not set here.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3BackendConfig {
    pub enabled: bool,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl Default for S3BackendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            region: "us-east-1".to_string(),
            endpoint_url: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl std::fmt::Debug for S3BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BackendConfig")
            .field("enabled", &self.enabled)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("force_path_style", &self.force_path_style)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryBackendConfig {
    pub enabled: bool,
}

/// Names a backend section for messages and registry lookups.
pub trait StorageBackendConfig {
    const SCHEME: &'static str;
    fn enabled(&self) -> bool;
}

impl StorageBackendConfig for S3BackendConfig {
    const SCHEME: &'static str = "s3";
    fn enabled(&self) -> bool {
        self.enabled
    }
}

impl StorageBackendConfig for MemoryBackendConfig {
    const SCHEME: &'static str = "memory";
    fn enabled(&self) -> bool {
        self.enabled
    }
}

impl IrisConfig {
    /// Load from `path`, or from the first of [`SEARCH_PATHS`] that exists,
    /// then apply `ONEIMAGE__*` overrides from the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::discover()?,
        };
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_toml_with_env(&raw, std::env::vars())
    }

    fn discover() -> Result<PathBuf, ConfigError> {
        SEARCH_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
            .ok_or_else(|| ConfigError::NotFound {
                searched: SEARCH_PATHS.join(", "),
            })
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Self::from_toml_with_env(raw, std::iter::empty())
    }

    pub fn from_toml_with_env<I>(raw: &str, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut table: toml::Table = raw.parse()?;
        rename_section(&mut table, LEGACY_SERVER_SECTION, "server");
        apply_env_overrides(&mut table, vars);
        let config: IrisConfig = toml::Value::Table(table).try_into()?;
        let config = config.with_derived_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Resolve the zero-means-derived fields.
    pub fn with_derived_defaults(mut self) -> Self {
        if self.server.concurrency == 0 {
            self.server.concurrency = num_cpus::get() * 2;
        }
        if self.server.max_conns == 0 {
            self.server.max_conns = self.server.concurrency * 10;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.server.max_file_size == 0 {
            return invalid("server.max_file_size must be greater than 0".into());
        }
        if self.server.upload_buffer_size == 0 {
            return invalid("server.upload_buffer_size must be greater than 0".into());
        }
        if self.server.buffer_pool_calib_threshold == 0 {
            return invalid("server.buffer_pool_calib_threshold must be greater than 0".into());
        }
        if self.server.buffer_pool_tolerance < 0.0 {
            return invalid("server.buffer_pool_tolerance cannot be negative".into());
        }
        if ImageFormat::from_str(&self.image.format).is_err() {
            return invalid(format!("image.type '{}' is not a known format", self.image.format));
        }
        if ImageFormat::from_str(&self.storage.format).is_err() {
            return invalid(format!("storage.format '{}' is not a known format", self.storage.format));
        }

        let scheme = self.server.storage.as_str();
        let enabled = match scheme {
            S3BackendConfig::SCHEME => self.storage.s3.enabled(),
            MemoryBackendConfig::SCHEME => self.storage.memory.enabled(),
            other => return invalid(format!("server.storage '{other}' names no known backend")),
        };
        if !enabled {
            return invalid(format!("server.storage '{scheme}' is not enabled under [storage.{scheme}]"));
        }
        if self.storage.bucket.is_empty() {
            return invalid("storage.bucket cannot be empty".into());
        }
        Ok(())
    }

    /// Schemes of every enabled backend.
    pub fn enabled_backends(&self) -> Vec<&'static str> {
        let mut schemes = Vec::new();
        if self.storage.s3.enabled() {
            schemes.push(S3BackendConfig::SCHEME);
        }
        if self.storage.memory.enabled() {
            schemes.push(MemoryBackendConfig::SCHEME);
        }
        schemes
    }
}

fn rename_section(root: &mut toml::Table, from: &str, to: &str) {
    if root.contains_key(to) {
        return;
    }
    if let Some(section) = root.remove(from) {
        root.insert(to.to_string(), section);
    }
}

/// Overlay `ONEIMAGE__A__B=value` onto `a.b`. Returns the number of keys set.
fn apply_env_overrides<I>(root: &mut toml::Table, vars: I) -> usize
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut applied = 0;

    'vars: for (key, value) in vars {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let normalized = stripped.to_lowercase();
        let path: Vec<&str> = normalized.split("__").collect();
        if path.len() < 2 || path.iter().any(|s| s.is_empty()) {
            continue;
        }
        let Some((leaf, parents)) = path.split_last() else {
            continue;
        };

        let mut table: &mut toml::Table = root;
        for segment in parents {
            let segment = match *segment {
                LEGACY_SERVER_SECTION => "server",
                other => other,
            };
            let entry = table
                .entry(segment.to_string())
                .or_insert(toml::Value::Table(toml::Table::new()));
            match entry.as_table_mut() {
                Some(next) => table = next,
                None => continue 'vars,
            }
        }

        let typed = coerce(table.get(*leaf), &value);
        table.insert(leaf.to_string(), typed);
        applied += 1;
    }

    applied
}

/// Keep the type of the value being replaced; infer one for new keys.
fn coerce(existing: Option<&toml::Value>, raw: &str) -> toml::Value {
    use toml::Value;

    let as_string = || Value::String(raw.to_string());
    match existing {
        Some(Value::String(_)) => as_string(),
        Some(Value::Integer(_)) => raw.parse().map(Value::Integer).unwrap_or_else(|_| as_string()),
        Some(Value::Float(_)) => raw.parse().map(Value::Float).unwrap_or_else(|_| as_string()),
        Some(Value::Boolean(_)) => raw.parse().map(Value::Boolean).unwrap_or_else(|_| as_string()),
        Some(Value::Array(_)) => Value::Array(
            raw.split(',')
                .map(|s| Value::String(s.trim().to_string()))
                .collect(),
        ),
        _ => {
            if let Ok(b) = raw.parse::<bool>() {
                Value::Boolean(b)
            } else if let Ok(i) = raw.parse::<i64>() {
                Value::Integer(i)
            } else if let Ok(f) = raw.parse::<f64>() {
                Value::Float(f)
            } else {
                as_string()
            }
        }
    }
}
