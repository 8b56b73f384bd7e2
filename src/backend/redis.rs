//! Redis cache backend over a deadpool connection pool.

use super::CacheBackend;
use crate::config::env_parse;
use crate::error::{Error, Result};
use deadpool_redis::{redis::AsyncCommands, Config as PoolConfig, Connection, Pool, Runtime};
use std::fmt;
use std::time::Duration;

/// Snapshot of the connection pool.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Pool size when `REDIS_POOL_SIZE` is unset.
const DEFAULT_POOL_SIZE: u32 = 16;

#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
    /// Bounds both opening a connection and waiting for a free one.
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// `redis://[user:password@]host:port/db`. A password without a user
    /// authenticates as `default` (Redis 6 ACL).
    pub fn connection_string(&self) -> String {
        let auth = match (&self.username, &self.password) {
            (Some(user), Some(password)) => format!("{}:{}@", user, password),
            (None, Some(password)) => format!("default:{}@", password),
            _ => String::new(),
        };
        format!(
            "redis://{}{}:{}/{}",
            auth, self.host, self.port, self.database
        )
    }

    /// Read `REDIS_HOST`, `REDIS_PORT`, `REDIS_USERNAME`, `REDIS_PASSWORD`,
    /// `REDIS_DB` and `REDIS_POOL_SIZE`, keeping defaults for unset variables.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        let defaults = RedisConfig::default();
        Ok(RedisConfig {
            host: std::env::var("REDIS_HOST").unwrap_or(defaults.host),
            port: env_parse("REDIS_PORT")?.unwrap_or(defaults.port),
            username: std::env::var("REDIS_USERNAME").ok(),
            password: std::env::var("REDIS_PASSWORD").ok(),
            database: env_parse("REDIS_DB")?.unwrap_or(defaults.database),
            pool_size: env_parse("REDIS_POOL_SIZE")?.unwrap_or(defaults.pool_size),
            connection_timeout: defaults.connection_timeout,
        })
    }
}

fn command_failed(command: &str, key: &str, e: impl fmt::Display) -> Error {
    Error::BackendError(format!("Redis {} failed for key {}: {}", command, key, e))
}

/// Pooled Redis client. Each command borrows a connection for its own
/// duration only.
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// # Errors
    /// Returns `Error::BackendError` if the pool cannot be built.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size as usize);
        pool_config.timeouts.wait = Some(config.connection_timeout);
        pool_config.timeouts.create = Some(config.connection_timeout);

        let mut cfg = PoolConfig::from_url(config.connection_string());
        cfg.pool = Some(pool_config);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::BackendError(format!("Failed to create Redis pool: {}", e)))?;

        info!(
            "✓ Redis backend initialized: {}:{}/{} (pool size: {})",
            config.host, config.port, config.database, config.pool_size
        );
        Ok(RedisBackend { pool })
    }

    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            connections: status.size as u32,
            idle_connections: status.available as u32,
        }
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))
    }
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self
            .connection()
            .await?
            .get(key)
            .await
            .map_err(|e| command_failed("GET", key, e))?;

        debug!(
            "✓ Redis GET {} -> {}",
            key,
            if value.is_some() { "HIT" } else { "MISS" }
        );
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        // SET EX takes whole seconds and rejects 0
        let seconds = ttl.as_secs().max(1);
        self.connection()
            .await?
            .set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|e| command_failed("SET", key, e))?;

        debug!("✓ Redis SET {} (TTL: {}s)", key, seconds);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let removed: u64 = self
            .connection()
            .await?
            .del(key)
            .await
            .map_err(|e| command_failed("DEL", key, e))?;

        debug!("✓ Redis DEL {} ({})", key, removed);
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.connection()
            .await?
            .exists(key)
            .await
            .map_err(|e| command_failed("EXISTS", key, e))
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection().await?;
        let pong: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis PING failed: {}", e)))?;
        Ok(pong == "PONG")
    }
}
