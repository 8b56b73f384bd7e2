//! Cache traffic reporting.
//!
//! [`CacheLayer`](crate::cache::CacheLayer) reports every lookup outcome,
//! write, delete and failure to a [`CacheMetrics`] sink. The trait's default
//! methods log through the `log` crate, so an exporter only overrides what it
//! counts:
//!
//! ```ignore
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_miss(&self, key: &str, _duration: Duration) {
//!         // counter!("carrent_cache_miss", "entity" => entity_of(key)).increment(1);
//!     }
//! }
//!
//! let cache = CacheLayer::new(backend, ttl).with_metrics(Arc::new(PrometheusMetrics));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Sink for cache events. Durations cover the backend round trip.
pub trait CacheMetrics: Send + Sync {
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("⚡ cache hit {} ({:?})", key, duration);
    }

    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("⚠ cache miss {} ({:?})", key, duration);
    }

    fn record_set(&self, key: &str, duration: Duration) {
        debug!("✓ cache set {} ({:?})", key, duration);
    }

    fn record_delete(&self, key: &str, duration: Duration) {
        debug!("✓ cache del {} ({:?})", key, duration);
    }

    /// A backend or decode failure about to be returned to the caller.
    fn record_error(&self, key: &str, error: &str) {
        warn!("✗ cache error {}: {}", key, error);
    }
}

/// Logs every event via the `log` crate.
#[derive(Clone, Default)]
pub struct LogMetrics;

impl CacheMetrics for LogMetrics {}

/// Discards every event.
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_set(&self, _key: &str, _duration: Duration) {}
    fn record_delete(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Snapshot of [`CounterMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
}

impl CacheStats {
    /// Hits over lookups, `0.0` before the first lookup.
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// In-process counters, e.g. for a health endpoint.
#[derive(Default)]
pub struct CounterMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl CounterMetrics {
    pub fn new() -> Self {
        CounterMetrics::default()
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl CacheMetrics for CounterMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self, _key: &str, _duration: Duration) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_set(&self, _key: &str, _duration: Duration) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    fn record_delete(&self, _key: &str, _duration: Duration) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, key: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!("✗ cache error {}: {}", key, error);
    }
}
