//! Cache backend implementations.

use crate::error::Result;
use std::time::Duration;

pub mod inmemory;
pub mod recording;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemoryBackend;
pub use recording::{CacheOp, OpKind, RecordingBackend};
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisBackend, RedisConfig};

/// String key-value store the cache layer writes through.
///
/// Only the commands the managers issue are required: `GET`, `SET` with an
/// expiry and `DEL` reporting how many keys it removed. Methods take `&self`;
/// clones of a backend address the same store.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// `Ok(None)` for an absent or expired key. Transport failures are
    /// `Err`, never `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Remove `key`; `Ok(0)` when it was not there.
    async fn delete(&self, key: &str) -> Result<u64>;

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// `Ok(true)` when the store answers.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
