//! Business operations for cars and orders.
//!
//! Use cases sit between a transport (REST or gRPC handler) and the
//! resource managers: they validate payloads, resolve records by id and
//! decide which cache strategy each step uses. Lookups that precede a
//! mutation always revalidate so the mutation works on the stored state.

use crate::backend::CacheBackend;
use crate::error::Result;
use crate::manager::{CarManager, OrderManager};
use crate::model::{
    Car, CarFilter, CreateCar, CreateOrder, Order, OrderFilter, PageFilter, Pagination, UpdateCar,
    UpdateOrder,
};
use crate::repository::DataRepository;
use crate::strategy::CacheControl;

#[derive(Clone)]
pub struct CarUsecase<R, B: CacheBackend> {
    cars: CarManager<R, B>,
}

impl<R, B> CarUsecase<R, B>
where
    R: DataRepository<Car>,
    B: CacheBackend,
{
    pub fn new(cars: CarManager<R, B>) -> Self {
        CarUsecase { cars }
    }

    pub fn manager(&self) -> &CarManager<R, B> {
        &self.cars
    }

    /// # Errors
    /// `Error::Invalid` for a bad payload, otherwise the insert error.
    pub async fn create(&self, payload: CreateCar) -> Result<Car> {
        payload.validate()?;
        let mut car = payload.into_car();
        self.cars.insert(&mut car).await?;
        info!("✓ Car {} created by {}", car.id, car.audit.created_by);
        Ok(car)
    }

    /// # Errors
    /// `Error::NotFound` if no live car has `id`.
    pub async fn get_by_id(&self, cache_control: CacheControl, id: i64) -> Result<Car> {
        self.cars
            .get_single_by_param(cache_control, &CarFilter::by_id(id))
            .await
    }

    /// # Errors
    /// See [`crate::manager::ResourceManager::get_by_param`].
    pub async fn get_by_param(
        &self,
        cache_control: CacheControl,
        filter: &PageFilter<CarFilter>,
    ) -> Result<(Vec<Car>, Pagination)> {
        self.cars.get_by_param(cache_control, filter).await
    }

    /// Apply `patch` to car `id`. An empty patch returns the stored car
    /// unchanged.
    ///
    /// # Errors
    /// `Error::Invalid`, `Error::NotFound` or the update error.
    pub async fn update_by_id(&self, id: i64, patch: UpdateCar) -> Result<Car> {
        patch.validate()?;
        let mut car = self.get_by_id(CacheControl::MustRevalidate, id).await?;
        if patch.is_empty() {
            return Ok(car);
        }

        patch.apply(&mut car);
        self.cars.update(&mut car).await?;
        Ok(car)
    }

    /// Soft-delete car `id` on behalf of `actor`.
    ///
    /// # Errors
    /// `Error::NotFound` or the delete error.
    pub async fn delete_by_id(&self, id: i64, actor: i64) -> Result<()> {
        let mut car = self.get_by_id(CacheControl::MustRevalidate, id).await?;
        self.cars.delete(&mut car, actor, false).await?;
        info!("✓ Car {} deleted by {}", id, actor);
        Ok(())
    }
}

/// Order operations; orders reference cars, so the car manager is needed to
/// check the reference before writing.
#[derive(Clone)]
pub struct OrderUsecase<R, CR, B: CacheBackend> {
    orders: OrderManager<R, B>,
    cars: CarManager<CR, B>,
}

impl<R, CR, B> OrderUsecase<R, CR, B>
where
    R: DataRepository<Order>,
    CR: DataRepository<Car>,
    B: CacheBackend,
{
    pub fn new(orders: OrderManager<R, B>, cars: CarManager<CR, B>) -> Self {
        OrderUsecase { orders, cars }
    }

    pub fn manager(&self) -> &OrderManager<R, B> {
        &self.orders
    }

    async fn ensure_car(&self, car_id: i64) -> Result<()> {
        self.cars
            .get_single_by_param(CacheControl::MustRevalidate, &CarFilter::by_id(car_id))
            .await
            .map(|_| ())
    }

    /// # Errors
    /// `Error::Invalid` for a bad payload, `Error::NotFound` if the car does
    /// not exist, otherwise the insert error.
    pub async fn create(&self, payload: CreateOrder) -> Result<Order> {
        let mut order = payload.into_order()?;
        self.ensure_car(order.car_id).await?;
        self.orders.insert(&mut order).await?;
        info!("✓ Order {} created for car {}", order.id, order.car_id);
        Ok(order)
    }

    /// # Errors
    /// `Error::NotFound` if no live order has `id`.
    pub async fn get_by_id(&self, cache_control: CacheControl, id: i64) -> Result<Order> {
        self.orders
            .get_single_by_param(cache_control, &OrderFilter::by_id(id))
            .await
    }

    /// # Errors
    /// See [`crate::manager::ResourceManager::get_by_param`].
    pub async fn get_by_param(
        &self,
        cache_control: CacheControl,
        filter: &PageFilter<OrderFilter>,
    ) -> Result<(Vec<Order>, Pagination)> {
        self.orders.get_by_param(cache_control, filter).await
    }

    /// Apply `patch` to order `id`. A patch moving the order to another car
    /// checks that car first.
    ///
    /// # Errors
    /// `Error::Invalid`, `Error::NotFound` (order or new car) or the update
    /// error.
    pub async fn update_by_id(&self, id: i64, patch: UpdateOrder) -> Result<Order> {
        patch.validate()?;
        let mut order = self.get_by_id(CacheControl::MustRevalidate, id).await?;
        if patch.is_empty() {
            return Ok(order);
        }

        if let Some(car_id) = patch.car_id.filter(|car_id| *car_id != order.car_id) {
            self.ensure_car(car_id).await?;
        }

        patch.apply(&mut order);
        self.orders.update(&mut order).await?;
        Ok(order)
    }

    /// Soft-delete order `id` on behalf of `actor`.
    ///
    /// # Errors
    /// `Error::NotFound` or the delete error.
    pub async fn delete_by_id(&self, id: i64, actor: i64) -> Result<()> {
        let mut order = self.get_by_id(CacheControl::MustRevalidate, id).await?;
        self.orders.delete(&mut order, actor, false).await?;
        info!("✓ Order {} deleted by {}", id, actor);
        Ok(())
    }
}
