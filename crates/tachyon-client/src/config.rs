//! Client configuration.

use std::time::Duration;

use tachyon_core::{defaults, validate_usecase_id, Error, Result};

/// Configuration for [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, without the `/api/v1` prefix.
    pub base_url: String,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Base backoff delay; retry `n` waits `retry_delay * 2^(n-1)`.
    pub retry_delay: Duration,
    /// Lifetime of a cached GET response. Zero disables caching.
    pub cache_ttl: Duration,
    /// Most responses held at once; the least recently used is evicted.
    pub cache_capacity: usize,
    /// Per-attempt HTTP timeout.
    pub timeout: Duration,
    /// Usecase active when the client is created.
    pub usecase: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::API_BASE_URL.to_string(),
            max_retries: defaults::MAX_RETRIES,
            retry_delay: Duration::from_millis(defaults::RETRY_DELAY_MS),
            cache_ttl: Duration::from_secs(defaults::CACHE_TTL_SECS),
            cache_capacity: defaults::CACHE_CAPACITY,
            timeout: Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS),
            usecase: defaults::USECASE.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `TACHYON_API_BASE_URL` | `http://localhost:8000` | Backend base URL |
    /// | `TACHYON_MAX_RETRIES` | `3` | Retries for transient failures |
    /// | `TACHYON_RETRY_DELAY_MS` | `1000` | Base backoff delay |
    /// | `TACHYON_CACHE_TTL_SECS` | `300` | Cache TTL, `0` disables caching |
    /// | `TACHYON_CACHE_CAPACITY` | `256` | Most cached responses |
    /// | `TACHYON_TIMEOUT_SECS` | `30` | Per-attempt HTTP timeout |
    /// | `TACHYON_USECASE` | `usecase_001` | Initial usecase |
    pub fn from_env() -> Self {
        let base_url = std::env::var("TACHYON_API_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::API_BASE_URL.to_string());

        let max_retries = std::env::var("TACHYON_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults::MAX_RETRIES);

        let retry_delay_ms = std::env::var("TACHYON_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::RETRY_DELAY_MS);

        let cache_ttl_secs = std::env::var("TACHYON_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::CACHE_TTL_SECS);

        let cache_capacity = std::env::var("TACHYON_CACHE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::CACHE_CAPACITY)
            .max(1);

        let timeout_secs = std::env::var("TACHYON_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::REQUEST_TIMEOUT_SECS)
            .max(1);

        let usecase = std::env::var("TACHYON_USECASE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::USECASE.to_string());

        Self {
            base_url,
            max_retries,
            retry_delay: Duration::from_millis(retry_delay_ms),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            cache_capacity,
            timeout: Duration::from_secs(timeout_secs),
            usecase,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_usecase(mut self, usecase: impl Into<String>) -> Self {
        self.usecase = usecase.into();
        self
    }

    /// Check the configuration before a client is built from it.
    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(Error::InvalidInput("base URL must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::InvalidInput(format!(
                "base URL '{}' must start with http:// or https://",
                url
            )));
        }
        if self.cache_capacity == 0 {
            return Err(Error::InvalidInput("cache capacity must be positive".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidInput("timeout must be positive".into()));
        }
        validate_usecase_id(&self.usecase)
    }

    /// Backoff before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        self.retry_delay.saturating_mul(1u32 << exp)
    }
}
