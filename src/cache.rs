//! JSON cache layer over a [`CacheBackend`].
//!
//! Absence is reported as `Error::CacheMiss`, distinct from any backend
//! failure. Every write deletes the key first and then sets it with the
//! configured TTL; the two calls are never merged into an upsert.

use crate::backend::CacheBackend;
use crate::error::{Error, Result};
use crate::observability::{CacheMetrics, LogMetrics};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct CacheLayer<B: CacheBackend> {
    backend: B,
    ttl: Duration,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend> CacheLayer<B> {
    pub fn new(backend: B, ttl: Duration) -> Self {
        CacheLayer {
            backend,
            ttl,
            metrics: Arc::new(LogMetrics),
        }
    }

    /// Replace the default log-based metrics.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Read and decode `key`.
    ///
    /// # Errors
    /// - `Error::CacheMiss` if the key is absent
    /// - `Error::BackendError` if the backend fails
    /// - `Error::BadRequest` if the stored value does not decode
    pub async fn get_json<V: DeserializeOwned>(&self, key: &str) -> Result<V> {
        let start = Instant::now();
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.metrics.record_miss(key, start.elapsed());
                return Err(Error::CacheMiss);
            }
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                return Err(e);
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.metrics.record_hit(key, start.elapsed());
                Ok(value)
            }
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                Err(Error::BadRequest(format!(
                    "error decode cache entry {}: {}",
                    key, e
                )))
            }
        }
    }

    /// Serialize `value` and store it under `key`: `DEL` then `SET`.
    ///
    /// # Errors
    /// Returns `Error::BadRequest` if `value` does not serialize, or the
    /// backend error of the failing call. A failed `DEL` skips the `SET`.
    pub async fn refresh<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> Result<()> {
        let payload = serde_json::to_string(value)?;

        let start = Instant::now();
        if let Err(e) = self.backend.delete(key).await {
            self.metrics.record_error(key, &e.to_string());
            return Err(e);
        }
        self.metrics.record_delete(key, start.elapsed());

        let start = Instant::now();
        if let Err(e) = self.backend.set(key, payload, self.ttl).await {
            self.metrics.record_error(key, &e.to_string());
            return Err(e);
        }
        self.metrics.record_set(key, start.elapsed());
        Ok(())
    }

    /// Write a list result and its pagination descriptor, list first.
    ///
    /// If the list write fails the pagination entry is left untouched and
    /// the list error is returned.
    ///
    /// # Errors
    /// Returns the error of the first failing write.
    pub async fn write_pair_or_fail<D, P>(
        &self,
        data_key: &str,
        data: &D,
        pagination_key: &str,
        pagination: &P,
    ) -> Result<()>
    where
        D: Serialize + ?Sized,
        P: Serialize + ?Sized,
    {
        self.refresh(data_key, data).await?;
        self.refresh(pagination_key, pagination).await
    }
}
