//! Pooled client for calls to the sibling rental service.
//!
//! Any client type can be pooled by implementing
//! [`deadpool::managed::Manager`] for its factory. Each call borrows one
//! connection, runs under the configured deadline and hands the connection
//! back when the borrow is dropped, whether the call succeeded, failed or
//! timed out.

use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use deadpool::managed::{self, Manager, Pool};
use futures::future::BoxFuture;
use std::fmt;
use std::time::Duration;

pub struct UpstreamPool<M: Manager> {
    pool: Pool<M>,
    timeout: Duration,
}

impl<M: Manager> Clone for UpstreamPool<M> {
    fn clone(&self) -> Self {
        UpstreamPool {
            pool: self.pool.clone(),
            timeout: self.timeout,
        }
    }
}

impl<M> UpstreamPool<M>
where
    M: Manager,
    M::Error: fmt::Display,
{
    /// # Errors
    /// Returns `Error::ConfigError` if the pool cannot be built.
    pub fn new(manager: M, config: &UpstreamConfig) -> Result<Self> {
        let pool = Pool::builder(manager)
            .max_size(config.max_size)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create upstream pool: {}", e)))?;

        info!(
            "✓ Upstream pool ready (max_size: {}, timeout: {:?})",
            config.max_size, config.timeout
        );
        Ok(UpstreamPool {
            pool,
            timeout: config.timeout,
        })
    }

    /// Run `call` on a pooled connection.
    ///
    /// ```ignore
    /// let car = upstream
    ///     .call(|client| Box::pin(async move { client.get_car_by_id(id).await }))
    ///     .await?;
    /// ```
    ///
    /// # Errors
    /// `Error::UpstreamClient` if no connection can be acquired, the call
    /// exceeds the deadline, or the call itself fails. Upstream errors
    /// returned by `call` pass through unchanged; any other error is wrapped.
    pub async fn call<T, F>(&self, call: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut M::Type) -> BoxFuture<'c, Result<T>>,
    {
        let mut conn = self.pool.get().await.map_err(|e| {
            warn!("✗ Upstream connection unavailable: {}", e);
            Error::UpstreamClient(format!("error client connection: {}", e))
        })?;

        match tokio::time::timeout(self.timeout, call(&mut *conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e @ Error::UpstreamClient(_))) => Err(e),
            Ok(Err(e)) => Err(Error::UpstreamClient(format!("error client: {}", e))),
            Err(_) => {
                warn!("✗ Upstream call exceeded {:?}", self.timeout);
                Err(Error::UpstreamClient(format!(
                    "error client: deadline of {:?} exceeded",
                    self.timeout
                )))
            }
        }
    }

    pub fn status(&self) -> managed::Status {
        self.pool.status()
    }

    pub fn close(&self) {
        self.pool.close();
    }
}
