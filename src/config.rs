//! Runtime configuration.
//!
//! Zero values mean "use the default", so a config deserialized from an empty
//! source still behaves.

use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

/// Page size used when neither the request nor the resource config sets one.
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Cache TTL used when the resource config does not set one.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(5 * 60);

/// Per-resource settings (`Car`, `Order`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Default page size; `0` falls back to [`DEFAULT_PAGE_LIMIT`].
    pub page_limit: i64,
    /// Cache TTL; zero falls back to [`DEFAULT_EXPIRATION`].
    pub expiration_time: Duration,
}

impl ResourceConfig {
    pub fn new(page_limit: i64, expiration_time: Duration) -> Self {
        ResourceConfig {
            page_limit,
            expiration_time,
        }
    }

    /// Read `{PREFIX}_PAGE_LIMIT` and `{PREFIX}_EXPIRATION_TIME` (seconds).
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if a variable is set but not a number.
    pub fn from_env(prefix: &str) -> Result<Self> {
        let page_limit = env_parse::<i64>(&format!("{}_PAGE_LIMIT", prefix))?.unwrap_or(0);
        let seconds = env_parse::<u64>(&format!("{}_EXPIRATION_TIME", prefix))?.unwrap_or(0);
        Ok(ResourceConfig::new(page_limit, Duration::from_secs(seconds)))
    }

    /// Resolve the page size for a request: request value, then this config,
    /// then the global default.
    pub fn effective_limit(&self, requested: i64) -> i64 {
        if requested > 0 {
            requested
        } else if self.page_limit > 0 {
            self.page_limit
        } else {
            DEFAULT_PAGE_LIMIT
        }
    }

    pub fn ttl(&self) -> Duration {
        if self.expiration_time.is_zero() {
            DEFAULT_EXPIRATION
        } else {
            self.expiration_time
        }
    }
}

/// Settings for the pooled inter-service client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub max_size: usize,
    /// Deadline applied to each call.
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            max_size: 10,
            timeout: Duration::from_secs(1),
        }
    }
}

impl UpstreamConfig {
    /// Read `UPSTREAM_POOL_SIZE` and `UPSTREAM_TIMEOUT_MS`.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if a variable is set but not a number.
    pub fn from_env() -> Result<Self> {
        let defaults = UpstreamConfig::default();
        Ok(UpstreamConfig {
            max_size: env_parse("UPSTREAM_POOL_SIZE")?.unwrap_or(defaults.max_size),
            timeout: env_parse::<u64>("UPSTREAM_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
        })
    }
}

/// Parse an optional environment variable.
pub(crate) fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => parse_value(name, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::ConfigError(format!("{}={:?}: {}", name, raw, e)))
}
