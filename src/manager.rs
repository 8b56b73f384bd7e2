//! Resource manager: read-through caching over a repository.
//!
//! Reads follow the caller's [`CacheControl`]:
//!
//! ```text
//! PreferCache:    cache ─hit──────────────────────────▶ return
//!                   └─miss─▶ store ─▶ DEL+SET ─▶ return
//!                   └─other error ────────────────────▶ error
//! MustRevalidate: store ─▶ DEL+SET ─▶ return
//! ```
//!
//! List reads keep two entries per filter, the rows and their pagination
//! descriptor, and treat them as one unit: a miss on either regenerates
//! both. A failed cache write fails the call even though the rows were
//! read.
//!
//! Mutations go straight to the repository. Cached reads are not
//! invalidated; they expire with their TTL.

use crate::backend::CacheBackend;
use crate::cache::CacheLayer;
use crate::config::ResourceConfig;
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::model::{Car, Entity, Order, PageFilter, Pagination};
use crate::query::parse_order_by;
use crate::repository::DataRepository;
use crate::strategy::CacheControl;
use std::marker::PhantomData;

/// Cache-aware entry point for one resource.
///
/// Cheap to clone when the repository and backend are.
#[derive(Clone)]
pub struct ResourceManager<T, R, B: CacheBackend> {
    repository: R,
    cache: CacheLayer<B>,
    config: ResourceConfig,
    _entity: PhantomData<fn() -> T>,
}

pub type CarManager<R, B> = ResourceManager<Car, R, B>;
pub type OrderManager<R, B> = ResourceManager<Order, R, B>;

impl<T, R, B> ResourceManager<T, R, B>
where
    T: Entity,
    R: DataRepository<T>,
    B: CacheBackend,
{
    /// Build a manager; the cache TTL comes from `config`.
    pub fn new(repository: R, backend: B, config: ResourceConfig) -> Self {
        let cache = CacheLayer::new(backend, config.ttl());
        Self::with_cache(repository, cache, config)
    }

    /// Build a manager around a preconfigured cache layer (e.g. custom metrics).
    pub fn with_cache(repository: R, cache: CacheLayer<B>, config: ResourceConfig) -> Self {
        ResourceManager {
            repository,
            cache,
            config,
            _entity: PhantomData,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn cache(&self) -> &CacheLayer<B> {
        &self.cache
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// # Errors
    /// See [`DataRepository::insert`].
    pub async fn insert(&self, record: &mut T) -> Result<()> {
        self.repository.insert(record).await
    }

    /// # Errors
    /// See [`DataRepository::update`].
    pub async fn update(&self, record: &mut T) -> Result<()> {
        self.repository.update(record).await
    }

    /// # Errors
    /// See [`DataRepository::delete`].
    pub async fn delete(&self, record: &mut T, actor: i64, hard: bool) -> Result<()> {
        self.repository.delete(record, actor, hard).await
    }

    /// Single-record lookup.
    ///
    /// # Errors
    /// - `Error::BadRequest` if the filter cannot be encoded into a key
    /// - `Error::NotFound` / `Error::Get` from the store
    /// - `Error::BackendError` if reading (other than a miss) or writing
    ///   the cache fails
    pub async fn get_single_by_param(
        &self,
        cache_control: CacheControl,
        filter: &T::Filter,
    ) -> Result<T> {
        let key = CacheKeyBuilder::single::<T>(filter)?;

        if !cache_control.must_revalidate() {
            match self.cache.get_json::<T>(&key).await {
                Ok(record) => return Ok(record),
                Err(Error::CacheMiss) => {
                    debug!("⟳ {} miss, loading from store: {}", T::entity_name(), key)
                }
                Err(e) => return Err(e),
            }
        } else {
            debug!("⟳ {} revalidate: {}", T::entity_name(), key);
        }

        let record = self.repository.fetch_one(filter).await?;
        self.cache.refresh(&key, &record).await?;
        Ok(record)
    }

    /// Paginated lookup.
    ///
    /// # Errors
    /// - `Error::BadRequest` if the filter cannot be encoded or `order_by`
    ///   names an unknown column
    /// - `Error::Get` from the store
    /// - `Error::BackendError` if reading (other than a miss) or writing
    ///   either cache entry fails
    pub async fn get_by_param(
        &self,
        cache_control: CacheControl,
        filter: &PageFilter<T::Filter>,
    ) -> Result<(Vec<T>, Pagination)> {
        let (data_key, pagination_key) = CacheKeyBuilder::list_pair::<T>(filter)?;

        if !cache_control.must_revalidate() {
            let (data, pagination) = futures::join!(
                self.cache.get_json::<Vec<T>>(&data_key),
                self.cache.get_json::<Pagination>(&pagination_key)
            );
            match (data, pagination) {
                (Ok(data), Ok(pagination)) => return Ok((data, pagination)),
                (Err(Error::CacheMiss), _) | (_, Err(Error::CacheMiss)) => {
                    debug!("⟳ {} list miss, loading from store: {}", T::entity_name(), data_key)
                }
                (Err(e), _) | (_, Err(e)) => return Err(e),
            }
        } else {
            debug!("⟳ {} list revalidate: {}", T::entity_name(), data_key);
        }

        let (records, pagination) = self.load_page(filter).await?;
        self.cache
            .write_pair_or_fail(&data_key, &records, &pagination_key, &pagination)
            .await?;
        Ok((records, pagination))
    }

    async fn load_page(&self, filter: &PageFilter<T::Filter>) -> Result<(Vec<T>, Pagination)> {
        let limit = self.config.effective_limit(filter.limit);
        let page = filter.page.max(1);
        let order_by = filter.order_by.as_deref().unwrap_or_default();
        let order = parse_order_by(order_by, T::columns())?;
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| Error::BadRequest("page out of range".to_string()))?;

        let total = self.repository.count(&filter.filter).await?;
        let records = self
            .repository
            .fetch_page(&filter.filter, offset, limit, &order)
            .await?;

        let pagination = Pagination::new(page, limit, records.len() as i64, total, order_by);
        Ok((records, pagination))
    }
}
