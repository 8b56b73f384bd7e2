//! Wiring for a running service: one Postgres pool, one Redis pool and
//! the car and order use cases built over them. Pools for sibling services
//! are built on demand from the transport's connection manager.

use crate::backend::{CacheBackend, RedisBackend, RedisConfig};
use crate::config::{ResourceConfig, UpstreamConfig};
use crate::error::Result;
use crate::manager::ResourceManager;
use crate::model::{Car, Order};
use crate::repository::SqlRepository;
use crate::store::{PgConfig, PgExecutor};
use crate::upstream::UpstreamPool;
use crate::usecase::{CarUsecase, OrderUsecase};
use deadpool::managed::Manager;
use std::fmt;

pub type CarService = CarUsecase<SqlRepository<Car, PgExecutor>, RedisBackend>;
pub type OrderService =
    OrderUsecase<SqlRepository<Order, PgExecutor>, SqlRepository<Car, PgExecutor>, RedisBackend>;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub postgres: PgConfig,
    pub redis: RedisConfig,
    pub car: ResourceConfig,
    pub order: ResourceConfig,
    pub upstream: UpstreamConfig,
}

impl AppConfig {
    /// Read every section from the environment (`DATABASE_*`, `REDIS_*`,
    /// `CAR_*`, `ORDER_*`, `UPSTREAM_*`).
    ///
    /// # Errors
    /// Returns `Error::ConfigError` for a missing `DATABASE_URL` or a
    /// malformed number.
    pub fn from_env() -> Result<Self> {
        Ok(AppConfig {
            postgres: PgConfig::from_env()?,
            redis: RedisConfig::from_env()?,
            car: ResourceConfig::from_env("CAR")?,
            order: ResourceConfig::from_env("ORDER")?,
            upstream: UpstreamConfig::from_env()?,
        })
    }

    /// Pool `manager`'s connections with the configured size and deadline.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the pool cannot be built.
    pub fn upstream_pool<M>(&self, manager: M) -> Result<UpstreamPool<M>>
    where
        M: Manager,
        M::Error: fmt::Display,
    {
        UpstreamPool::new(manager, &self.upstream)
    }
}

/// Owns the connection pools; dropping it (or calling [`App::close`])
/// releases them.
pub struct App {
    pub db: PgExecutor,
    pub cache: RedisBackend,
    pub cars: CarService,
    pub orders: OrderService,
    upstream: UpstreamConfig,
}

impl App {
    /// # Errors
    /// Returns the connection error of Postgres or Redis.
    pub async fn connect(config: AppConfig) -> Result<Self> {
        let db = PgExecutor::connect(&config.postgres).await?;
        let cache = RedisBackend::new(config.redis).await?;

        let car_manager = ResourceManager::new(
            SqlRepository::<Car, _>::new(db.clone()),
            cache.clone(),
            config.car,
        );
        let order_manager = ResourceManager::new(
            SqlRepository::<Order, _>::new(db.clone()),
            cache.clone(),
            config.order,
        );

        info!("✓ Car and order services ready");
        Ok(App {
            db,
            cache,
            cars: CarUsecase::new(car_manager.clone()),
            orders: OrderUsecase::new(order_manager, car_manager),
            upstream: config.upstream,
        })
    }

    /// Pooled client for a sibling service, sized by `UPSTREAM_*`.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the pool cannot be built.
    pub fn upstream_pool<M>(&self, manager: M) -> Result<UpstreamPool<M>>
    where
        M: Manager,
        M::Error: fmt::Display,
    {
        UpstreamPool::new(manager, &self.upstream)
    }

    /// True when both Postgres and Redis answer.
    ///
    /// # Errors
    /// Returns the first failing dependency's error.
    pub async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1").execute(self.db.pool()).await?;
        self.cache.health_check().await
    }

    pub async fn close(&self) {
        self.db.close().await;
        info!("✓ Connections closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use deadpool::managed::{Metrics, RecycleResult};
    use std::time::Duration;

    struct Echo;

    impl Manager for Echo {
        type Type = String;
        type Error = Error;

        async fn create(&self) -> std::result::Result<String, Error> {
            Ok("rental".to_string())
        }

        async fn recycle(&self, _conn: &mut String, _metrics: &Metrics) -> RecycleResult<Error> {
            Ok(())
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            postgres: PgConfig::new("postgres://localhost/carrent"),
            redis: RedisConfig::default(),
            car: ResourceConfig::default(),
            order: ResourceConfig::default(),
            upstream: UpstreamConfig {
                max_size: 2,
                timeout: Duration::from_millis(500),
            },
        }
    }

    #[tokio::test]
    async fn test_upstream_pool_follows_config() {
        let upstream = config().upstream_pool(Echo).unwrap();

        let name = upstream
            .call(|conn| Box::pin(async move { Ok(conn.clone()) }))
            .await
            .unwrap();

        assert_eq!(name, "rental");
        assert_eq!(upstream.status().max_size, 2);
    }
}
