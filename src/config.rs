//! Service configuration: an optional TOML file, then environment overrides.
//!
//! The config file is optional: a missing or empty file yields
//! `Config::default()`. Unknown keys are accepted but logged as warnings.
//! Environment variables (`PORT`, `S3_BUCKET_NAME`, `AWS_REGION`, ...) take
//! precedence over the file.
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level service configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub host: String,

    pub port: u16,

    /// Per-attempt timeout when fetching a feed by URL.
    pub fetch_timeout_secs: u64,

    /// Largest feed accepted, fetched or uploaded.
    pub max_feed_bytes: usize,

    /// Allow fetching from localhost and private networks. Off in production.
    pub allow_private_hosts: bool,

    pub s3: StorageConfig,
}

/// Where published feeds are stored.
///
/// The secret access key is held as a [`SecretString`], whose `Debug` output
/// is redacted.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Target bucket. Required only when publishing.
    pub bucket: Option<String>,

    /// Falls back to the AWS SDK's region chain, then `us-east-1`.
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible stores.
    pub endpoint_url: Option<String>,

    /// Base of the returned public URL; defaults to the virtual-hosted
    /// S3 URL of the bucket.
    pub public_base_url: Option<String>,

    /// Key prefix for published feeds, without slashes.
    pub key_prefix: String,

    /// Static credentials. When unset the AWS SDK's default chain is used.
    pub access_key_id: Option<String>,

    #[serde(deserialize_with = "deserialize_secret")]
    pub secret_access_key: Option<SecretString>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            fetch_timeout_secs: 10,
            max_feed_bytes: 10 * 1024 * 1024,
            allow_private_hosts: false,
            s3: StorageConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: None,
            endpoint_url: None,
            public_base_url: None,
            key_prefix: "feeds".to_string(),
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "host",
        "port",
        "fetch_timeout_secs",
        "max_feed_bytes",
        "allow_private_hosts",
        "s3",
    ];

    const KNOWN_S3_KEYS: [&'static str; 7] = [
        "bucket",
        "region",
        "endpoint_url",
        "public_base_url",
        "key_prefix",
        "access_key_id",
        "secret_access_key",
    ];

    /// Loads the file at `path`, then applies the process environment.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw, &Self::KNOWN_KEYS, "");
            if let Some(toml::Value::Table(s3)) = raw.get("s3") {
                warn_unknown_keys(s3, &Self::KNOWN_S3_KEYS, "s3.");
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), port = config.port, "Loaded configuration");
        Ok(config)
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Empty values are ignored, so `PORT=` does not clobber the file.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("HOST") {
            self.host = host;
        }
        if let Some(port) = get("PORT") {
            self.port = parse_value("PORT", port)?;
        }
        if let Some(timeout) = get("FETCH_TIMEOUT_SECS") {
            self.fetch_timeout_secs = parse_value("FETCH_TIMEOUT_SECS", timeout)?;
        }
        if let Some(max) = get("MAX_FEED_BYTES") {
            self.max_feed_bytes = parse_value("MAX_FEED_BYTES", max)?;
        }
        if let Some(bucket) = get("S3_BUCKET_NAME") {
            self.s3.bucket = Some(bucket);
        }
        if let Some(region) = get("AWS_REGION") {
            self.s3.region = Some(region);
        }
        if let Some(endpoint) = get("S3_ENDPOINT_URL") {
            self.s3.endpoint_url = Some(endpoint);
        }
        if let Some(base) = get("S3_PUBLIC_BASE_URL") {
            self.s3.public_base_url = Some(base);
        }
        if let Some(key_id) = get("AWS_ACCESS_KEY_ID") {
            self.s3.access_key_id = Some(key_id);
        }
        if let Some(secret) = get("AWS_SECRET_ACCESS_KEY") {
            self.s3.secret_access_key = Some(SecretString::from(secret));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn warn_unknown_keys(table: &toml::Table, known: &[&str], prefix: &str) {
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            tracing::warn!(key = %format!("{prefix}{key}"), "Unknown key in config file, ignoring");
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

// ============================================================================
// Tests
// ============================================================================
