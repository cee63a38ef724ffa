//! Request, configuration and payload types.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// A single outbound fetch.
///
/// Immutable once built; the pipeline re-sends the same value on every retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    url: Url,
    method: reqwest::Method,
    headers: Vec<(String, String)>,
}

impl FetchRequest {
    /// GET request for `url`.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: reqwest::Method::GET,
            headers: Vec::new(),
        }
    }

    /// Same request with one more header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &reqwest::Method {
        &self.method
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

/// Retry budget and backoff applied by the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Pause before retrying a server error.
    pub server_error_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            server_error_delay: Duration::from_millis(default_server_retry_delay_ms()),
        }
    }
}

/// Bounds of the two image cache tiers. `0` disables a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCacheConfig {
    /// Maximum number of encoded images kept.
    pub count_limit: usize,

    /// Maximum total decoded bytes kept.
    pub memory_limit: usize,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            count_limit: default_cache_count_limit(),
            memory_limit: default_cache_memory_limit(),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the dog API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-attempt request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before retrying a server error, in milliseconds.
    #[serde(default = "default_server_retry_delay_ms")]
    pub server_retry_delay_ms: u64,

    /// Settle window before the monitor reports a lost connection, in milliseconds.
    #[serde(default = "default_no_connection_delay_ms")]
    pub no_connection_delay_ms: u64,

    /// Encoded image tier capacity (entries).
    #[serde(default = "default_cache_count_limit")]
    pub cache_count_limit: usize,

    /// Decoded image tier capacity (bytes).
    #[serde(default = "default_cache_memory_limit")]
    pub cache_memory_limit: usize,
}

fn default_base_url() -> String {
    "https://dog.ceo/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_server_retry_delay_ms() -> u64 {
    3_000
}

fn default_no_connection_delay_ms() -> u64 {
    5_000
}

fn default_cache_count_limit() -> usize {
    30
}

fn default_cache_memory_limit() -> usize {
    30 * 1024 * 1024
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            server_retry_delay_ms: default_server_retry_delay_ms(),
            no_connection_delay_ms: default_no_connection_delay_ms(),
            cache_count_limit: default_cache_count_limit(),
            cache_memory_limit: default_cache_memory_limit(),
        }
    }
}

impl ServiceConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `DOGFETCH_BASE_URL` | API base URL |
    /// | `DOGFETCH_TIMEOUT` | Request timeout in seconds |
    /// | `DOGFETCH_MAX_RETRIES` | Retries after the first attempt |
    /// | `DOGFETCH_RETRY_DELAY_MS` | Delay before retrying a server error |
    /// | `DOGFETCH_NO_CONNECTION_DELAY_MS` | Settle window of the connectivity monitor |
    /// | `DOGFETCH_CACHE_COUNT_LIMIT` | Encoded image tier capacity |
    /// | `DOGFETCH_CACHE_MEMORY_LIMIT` | Decoded image tier capacity in bytes |
    ///
    /// Unset variables fall back to defaults; set but malformed ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            base_url: std::env::var("DOGFETCH_BASE_URL").unwrap_or(defaults.base_url),
            timeout_secs: env_or("DOGFETCH_TIMEOUT", defaults.timeout_secs)?,
            max_retries: env_or("DOGFETCH_MAX_RETRIES", defaults.max_retries)?,
            server_retry_delay_ms: env_or(
                "DOGFETCH_RETRY_DELAY_MS",
                defaults.server_retry_delay_ms,
            )?,
            no_connection_delay_ms: env_or(
                "DOGFETCH_NO_CONNECTION_DELAY_MS",
                defaults.no_connection_delay_ms,
            )?,
            cache_count_limit: env_or("DOGFETCH_CACHE_COUNT_LIMIT", defaults.cache_count_limit)?,
            cache_memory_limit: env_or(
                "DOGFETCH_CACHE_MEMORY_LIMIT",
                defaults.cache_memory_limit,
            )?,
        })
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the server error retry delay.
    pub fn with_server_retry_delay(mut self, delay: Duration) -> Self {
        self.server_retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the cache bounds.
    pub fn with_cache_limits(mut self, count_limit: usize, memory_limit: usize) -> Self {
        self.cache_count_limit = count_limit;
        self.cache_memory_limit = memory_limit;
        self
    }

    /// Parsed and validated base URL.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: reason.to_string(),
        };

        let url = Url::parse(&self.base_url).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.cannot_be_a_base() {
            return Err(invalid("URL cannot carry path segments"));
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn no_connection_delay(&self) -> Duration {
        Duration::from_millis(self.no_connection_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            server_error_delay: Duration::from_millis(self.server_retry_delay_ms),
        }
    }

    pub fn cache_config(&self) -> ImageCacheConfig {
        ImageCacheConfig {
            count_limit: self.cache_count_limit,
            memory_limit: self.cache_memory_limit,
        }
    }
}

fn env_or<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            var: var.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

/// Response of `GET /breeds/list/all`: breed name to its sub-breeds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BreedList {
    #[serde(rename = "message")]
    pub breeds: BTreeMap<String, Vec<String>>,
}

impl BreedList {
    /// Breed names in ascending order.
    pub fn names(&self) -> Vec<String> {
        self.breeds.keys().cloned().collect()
    }
}

/// Response of `GET /breed/{breed}/images`.
///
/// Every entry must be an absolute URL; one bad entry fails the whole list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageUrlList {
    #[serde(rename = "message")]
    pub image_urls: Vec<Url>,
}

/// Response of `GET /breed/{breed}/images/random`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RandomImageUrl {
    #[serde(rename = "message")]
    pub image_url: Url,
}

/// An image of a specific dog together with its breed name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Breed {
    pub image_url: Url,
    pub breed_name: String,
}

impl Breed {
    /// Identity of the record: its image URL.
    pub fn id(&self) -> &str {
        self.image_url.as_str()
    }
}
