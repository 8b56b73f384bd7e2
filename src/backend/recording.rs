//! Recording backend for asserting cache traffic in tests.
//!
//! Wraps another backend, logs every `GET`/`SET`/`DEL` in call order and can
//! be told to fail specific operations, which is how manager tests check the
//! exact delete-then-set sequence and the error paths without a Redis server.

use super::{CacheBackend, InMemoryBackend};
use crate::error::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One cache call as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOp {
    Get(String),
    Set {
        key: String,
        value: String,
        ttl: Duration,
    },
    Del(String),
}

impl CacheOp {
    pub fn key(&self) -> &str {
        match self {
            CacheOp::Get(key) | CacheOp::Del(key) => key,
            CacheOp::Set { key, .. } => key,
        }
    }

    fn kind(&self) -> OpKind {
        match self {
            CacheOp::Get(_) => OpKind::Get,
            CacheOp::Set { .. } => OpKind::Set,
            CacheOp::Del(_) => OpKind::Del,
        }
    }
}

/// Operation selector for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Get,
    Set,
    Del,
}

#[derive(Clone)]
pub struct RecordingBackend<B: CacheBackend = InMemoryBackend> {
    inner: B,
    ops: Arc<Mutex<Vec<CacheOp>>>,
    failures: Arc<Mutex<Vec<(OpKind, String)>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingBackend<InMemoryBackend> {
    pub fn new() -> Self {
        Self::wrap(InMemoryBackend::new())
    }
}

impl Default for RecordingBackend<InMemoryBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: CacheBackend> RecordingBackend<B> {
    pub fn wrap(inner: B) -> Self {
        RecordingBackend {
            inner,
            ops: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Make every `kind` operation on `key` fail with a backend error.
    pub fn fail_on(&self, kind: OpKind, key: impl Into<String>) {
        lock(&self.failures).push((kind, key.into()));
    }

    /// Calls recorded so far, in order.
    pub fn ops(&self) -> Vec<CacheOp> {
        lock(&self.ops).clone()
    }

    /// Calls recorded so far, leaving the log empty.
    pub fn take_ops(&self) -> Vec<CacheOp> {
        std::mem::take(&mut *lock(&self.ops))
    }

    fn record(&self, op: CacheOp) -> Result<()> {
        let failing = lock(&self.failures)
            .iter()
            .any(|(kind, key)| *kind == op.kind() && key == op.key());
        let key = op.key().to_string();
        let kind = op.kind();
        lock(&self.ops).push(op);

        if failing {
            return Err(Error::BackendError(format!(
                "injected {:?} failure for key {}",
                kind, key
            )));
        }
        Ok(())
    }
}

impl<B: CacheBackend> CacheBackend for RecordingBackend<B> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.record(CacheOp::Get(key.to_string()))?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.record(CacheOp::Set {
            key: key.to_string(),
            value: value.clone(),
            ttl,
        })?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        self.record(CacheOp::Del(key.to_string()))?;
        self.inner.delete(key).await
    }
}
