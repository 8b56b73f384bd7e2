//! Process-local cache backend.
//!
//! Entries live in a sharded `DashMap` and carry their own deadline. Nothing
//! sweeps the map: an expired entry is dropped the next time its key is read
//! or deleted.

use super::CacheBackend;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Deadline used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct Slot {
    value: String,
    deadline: Instant,
}

impl Slot {
    fn live(&self, now: Instant) -> bool {
        now <= self.deadline
    }
}

/// In-memory stand-in for Redis, used by tests and single-node setups.
///
/// Clones share one map, so a backend handed to a manager can still be
/// inspected from the outside.
///
/// ```no_run
/// use carrent_core::backend::{CacheBackend, InMemoryBackend};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> carrent_core::Result<()> {
///     let backend = InMemoryBackend::new();
///     backend.set("gspCar:{}", "{}".to_string(), Duration::from_secs(300)).await?;
///     assert!(backend.get("gspCar:{}").await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    slots: Arc<DashMap<String, Slot>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        InMemoryBackend::default()
    }

    /// Stored entries, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Sorted keys of the entries still alive.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .slots
            .iter()
            .filter(|slot| slot.live(now))
            .map(|slot| slot.key().clone())
            .collect();
        keys.sort();
        keys
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let value = self
            .slots
            .get(key)
            .filter(|slot| slot.live(now))
            .map(|slot| slot.value.clone());

        if value.is_none() {
            self.slots.remove_if(key, |_, slot| !slot.live(now));
        }
        debug!(
            "✓ InMemory GET {} -> {}",
            key,
            if value.is_some() { "HIT" } else { "MISS" }
        );
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let deadline = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        let slot = Slot { value, deadline };
        self.slots.insert(key.to_string(), slot);
        debug!("✓ InMemory SET {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let now = Instant::now();
        let removed = self
            .slots
            .remove(key)
            .map_or(0, |(_, slot)| u64::from(slot.live(now)));
        debug!("✓ InMemory DEL {} ({})", key, removed);
        Ok(removed)
    }
}
