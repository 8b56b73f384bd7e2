//! # carrent-core
//!
//! Core of the car rental order service: cached, paginated access to the
//! `Car` and `Order` resources over a SQL store.
//!
//! ## Features
//!
//! - **Read-through cache:** single and paginated lookups served from a
//!   key-value cache, falling back to the store on a miss
//! - **Explicit revalidation:** a `Cache-Control: must-revalidate` read always
//!   hits the store and rewrites the cache entry
//! - **Deterministic keys:** one key per distinct filter (`gspCar:{...}`,
//!   `gpOrder:{...}`, `gppgOrder:{...}`)
//! - **Transactional writes:** insert, update, soft and hard delete, each in
//!   its own transaction with rollback on failure
//! - **Backend agnostic:** Redis for production, in-memory for tests, or any
//!   [`CacheBackend`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use carrent_core::{
//!     backend::InMemoryBackend,
//!     config::ResourceConfig,
//!     manager::ResourceManager,
//!     model::{CarFilter, PageFilter},
//!     repository::SqlRepository,
//!     store::PgExecutor,
//!     strategy::CacheControl,
//!     usecase::CarUsecase,
//! };
//!
//! let db = PgExecutor::connect(&pg_config).await?;
//! let cars = ResourceManager::new(
//!     SqlRepository::new(db),
//!     InMemoryBackend::new(),
//!     ResourceConfig::from_env("CAR")?,
//! );
//!
//! // Cache first; the store is only read on a miss.
//! let (page, pagination) = cars
//!     .get_by_param(
//!         CacheControl::from(header),
//!         &PageFilter::new(CarFilter::default()).with_order_by("day_rate desc"),
//!     )
//!     .await?;
//!
//! // Validation, revalidating lookups and audit stamping live in the use case.
//! let usecase = CarUsecase::new(cars);
//! usecase.delete_by_id(42, actor_id).await?;
//! ```
//!
//! With the `redis` and `postgres` features enabled, `app::App::connect`
//! wires all of the above from environment configuration.

#[macro_use]
extern crate log;

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod manager;
pub mod model;
pub mod observability;
pub mod query;
pub mod repository;
pub mod store;
pub mod strategy;
pub mod upstream;
pub mod usecase;

#[cfg(all(feature = "redis", feature = "postgres"))]
pub mod app;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use cache::CacheLayer;
pub use config::{ResourceConfig, UpstreamConfig};
pub use error::{Error, ErrorMessage, Result};
pub use key::{CacheKeyBuilder, KeyKind};
pub use manager::{CarManager, OrderManager, ResourceManager};
pub use model::{Entity, Filter, PageFilter, Pagination};
pub use repository::{DataRepository, SqlRepository};
pub use store::{SqlExecutor, Transaction};
pub use strategy::CacheControl;
pub use upstream::UpstreamPool;
pub use usecase::{CarUsecase, OrderUsecase};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
