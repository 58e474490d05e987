//! Configuration types for photo-feed
//!
//! All settings are passed explicitly: the request factory receives its base
//! URL and access key from [`ApiConfig`] rather than from ambient global state.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Remote photo API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the photo API (default: "https://api.unsplash.com/")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Access key sent as `Authorization: Client-ID {access_key}`
    #[serde(default)]
    pub access_key: String,

    /// Per-request timeout (default: 30 seconds)
    ///
    /// A timeout is reported like any other transport failure.
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_key: String::new(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Pagination settings shared by every provider created from this config
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PagingConfig {
    /// Number of records requested per page (default: 30)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// Execution queue settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum requests running at once across all providers sharing the queue (default: 4)
    ///
    /// Each provider still has at most one request in flight.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

/// Image cache settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// In-memory tier capacity in bytes (default: 50 MiB)
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity_bytes: u64,

    /// On-disk tier capacity in bytes (default: 100 MiB)
    #[serde(default = "default_disk_capacity")]
    pub disk_capacity_bytes: u64,

    /// Directory for the on-disk tier (None = memory only)
    #[serde(default)]
    pub disk_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity_bytes: default_memory_capacity(),
            disk_capacity_bytes: default_disk_capacity(),
            disk_dir: None,
        }
    }
}

/// Main configuration for photo-feed
///
/// Fields are organized into logical sub-configs:
/// - [`api`](ApiConfig) - endpoint, credentials, timeout
/// - [`paging`](PagingConfig) - page size
/// - [`queue`](QueueConfig) - shared request concurrency
/// - [`cache`](CacheConfig) - image cache capacities
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Pagination settings
    #[serde(default)]
    pub paging: PagingConfig,

    /// Execution queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Image cache settings
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Parse a configuration from a JSON document
    ///
    /// Missing fields take their defaults. The result is validated.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json).map_err(|e| Error::Config {
            message: format!("invalid configuration JSON: {}", e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Io(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&content)
    }

    /// Check the configuration for values that can never work
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.api.access_key.trim().is_empty() {
            return Err(Error::config("api.access_key", "access key must not be empty"));
        }
        url::Url::parse(&self.api.base_url).map_err(|e| {
            Error::config("api.base_url", format!("invalid base URL: {}", e))
        })?;
        if self.api.timeout.is_zero() {
            return Err(Error::config("api.timeout", "timeout must be greater than zero"));
        }
        if self.paging.page_size == 0 {
            return Err(Error::config(
                "paging.page_size",
                "page size must be greater than zero",
            ));
        }
        if self.queue.max_concurrent_requests == 0 {
            return Err(Error::config(
                "queue.max_concurrent_requests",
                "at least one concurrent request is required",
            ));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://api.unsplash.com/".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("photo-feed/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_page_size() -> u32 {
    30
}

fn default_max_concurrent_requests() -> usize {
    4
}

fn default_memory_capacity() -> u64 {
    50 * 1024 * 1024
}

fn default_disk_capacity() -> u64 {
    100 * 1024 * 1024
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
