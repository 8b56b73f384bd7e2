//! Data repository: the query side of a resource.
//!
//! `DataRepository` is what the managers depend on; `SqlRepository` is the
//! implementation over any [`SqlExecutor`]. Repositories know nothing about
//! the cache.
//!
//! # Transactions
//!
//! Every mutation runs in its own transaction:
//!
//! ```text
//! BEGIN ─▶ statement ─┬─ ok ──▶ COMMIT ──(fails)──▶ Error::Transaction
//!                     └─ err ─▶ ROLLBACK ─▶ Error::{Insert,Update,Delete}
//! ```
//!
//! A failed rollback is logged and the statement error is returned.

use crate::error::{Error, Result};
use crate::model::{Entity, Filter};
use crate::query::{self, OrderTerm};
use crate::store::{SqlExecutor, Transaction};
use chrono::{DateTime, Utc};
use std::marker::PhantomData;

/// Trait for data repository implementations.
///
/// Mockable seam between the managers and the store.
#[allow(async_fn_in_trait)]
pub trait DataRepository<T: Entity>: Send + Sync + Clone {
    /// Number of rows matching `filter`, ignoring paging.
    ///
    /// # Errors
    /// Returns `Error::Get` if the store fails.
    async fn count(&self, filter: &T::Filter) -> Result<i64>;

    /// One page of rows matching `filter`, in `order`.
    ///
    /// # Errors
    /// Returns `Error::Get` if the store fails.
    async fn fetch_page(
        &self,
        filter: &T::Filter,
        offset: i64,
        limit: i64,
        order: &[OrderTerm],
    ) -> Result<Vec<T>>;

    /// First row matching `filter`.
    ///
    /// # Errors
    /// - `Error::NotFound` if no row matches
    /// - `Error::Get` if the store fails
    async fn fetch_one(&self, filter: &T::Filter) -> Result<T>;

    /// Insert `record`, stamping its audit timestamps and generated id.
    ///
    /// # Errors
    /// `Error::Transaction` (begin/commit) or `Error::Insert`.
    async fn insert(&self, record: &mut T) -> Result<()>;

    /// Persist every column of `record`, stamping `updated_at`.
    ///
    /// # Errors
    /// `Error::Transaction` (begin/commit) or `Error::Update`.
    async fn update(&self, record: &mut T) -> Result<()>;

    /// Remove `record`: physically when `hard`, otherwise by marking
    /// `deleted_by`/`deleted_at` in a single update.
    ///
    /// # Errors
    /// `Error::Transaction` (begin/commit) or `Error::Delete`.
    async fn delete(&self, record: &mut T, actor: i64, hard: bool) -> Result<()>;
}

/// [`DataRepository`] over a SQL executor.
#[derive(Clone)]
pub struct SqlRepository<T, E> {
    executor: E,
    clock: fn() -> DateTime<Utc>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, E: SqlExecutor> SqlRepository<T, E> {
    pub fn new(executor: E) -> Self {
        SqlRepository {
            executor,
            clock: Utc::now,
            _entity: PhantomData,
        }
    }

    /// Use `clock` for audit timestamps instead of the system time.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    async fn begin(&self) -> Result<E::Tx> {
        self.executor
            .begin()
            .await
            .map_err(|e| Error::Transaction(format!("error begin transaction: {}", e)))
    }
}

/// Commit on success; on failure roll back and wrap the statement error.
async fn finish<X: Transaction, V>(
    tx: X,
    outcome: Result<V>,
    wrap: fn(String) -> Error,
    context: &str,
) -> Result<V> {
    match outcome {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| Error::Transaction(format!("error commit: {}", e)))?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!("error rollback after {}: {} ({})", context, rollback, e);
            }
            Err(wrap(format!("{}: {}", context, e)))
        }
    }
}

impl<T: Entity, E: SqlExecutor> DataRepository<T> for SqlRepository<T, E> {
    async fn count(&self, filter: &T::Filter) -> Result<i64> {
        let statement = query::count(T::table(), &filter.predicates());
        self.executor
            .fetch_count(&statement)
            .await
            .map_err(|e| Error::Get(format!("error count data: {}", e)))
    }

    async fn fetch_page(
        &self,
        filter: &T::Filter,
        offset: i64,
        limit: i64,
        order: &[OrderTerm],
    ) -> Result<Vec<T>> {
        let statement = query::select_page(
            T::table(),
            T::columns(),
            &filter.predicates(),
            order,
            limit,
            offset,
        );
        let rows = self
            .executor
            .fetch_all(&statement, T::columns())
            .await
            .map_err(|e| Error::Get(format!("error get {}: {}", T::table(), e)))?;
        rows.iter().map(T::from_row).collect()
    }

    async fn fetch_one(&self, filter: &T::Filter) -> Result<T> {
        let statement = query::select_one(T::table(), T::columns(), &filter.predicates());
        let row = self
            .executor
            .fetch_optional(&statement, T::columns())
            .await
            .map_err(|e| Error::Get(format!("error get {}: {}", T::table(), e)))?;

        match row {
            Some(row) => T::from_row(&row),
            None => Err(Error::NotFound(format!(
                "error get {}: no rows in result set",
                T::table()
            ))),
        }
    }

    async fn insert(&self, record: &mut T) -> Result<()> {
        let now = (self.clock)();
        let audit = record.audit_mut();
        audit.created_at = now;
        audit.updated_at = now;

        let statement = query::insert(T::table(), T::columns(), &record.values());
        let mut tx = self.begin().await?;
        let outcome = tx.fetch_scalar(&statement).await;
        let id = finish(tx, outcome, Error::Insert, "error insert").await?;

        record.set_id(id);
        debug!("✓ {} inserted with id {}", T::entity_name(), id);
        Ok(())
    }

    async fn update(&self, record: &mut T) -> Result<()> {
        let previous = std::mem::replace(&mut record.audit_mut().updated_at, (self.clock)());

        let statement = query::update(T::table(), T::columns(), &record.values(), record.id());
        let outcome = match self.begin().await {
            Ok(mut tx) => {
                let outcome = tx.execute(&statement).await;
                finish(tx, outcome, Error::Update, "error update").await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            // nothing was persisted
            record.audit_mut().updated_at = previous;
            return Err(e);
        }

        debug!("✓ {} {} updated", T::entity_name(), record.id());
        Ok(())
    }

    async fn delete(&self, record: &mut T, actor: i64, hard: bool) -> Result<()> {
        let now = (self.clock)();
        let statement = if hard {
            query::hard_delete(T::table(), record.id())
        } else {
            query::soft_delete(T::table(), record.id(), actor, now)
        };

        let mut tx = self.begin().await?;
        let outcome = tx.execute(&statement).await;
        finish(tx, outcome, Error::Delete, "error delete").await?;

        if !hard {
            let audit = record.audit_mut();
            audit.deleted_by = Some(actor);
            audit.deleted_at = Some(now);
        }
        debug!(
            "✓ {} {} deleted ({})",
            T::entity_name(),
            record.id(),
            if hard { "hard" } else { "soft" }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Car, CarFilter};
    use crate::query::Predicates;
    use crate::store::{MockExecutor, SqlQuery, SqlValue};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 2, 22, 2, 0, 0).unwrap()
    }

    fn repository(db: &MockExecutor) -> SqlRepository<Car, MockExecutor> {
        SqlRepository::new(db.clone()).with_clock(fixed_now)
    }

    fn sedan() -> Car {
        Car {
            id: 1,
            car_name: "sedan".to_string(),
            day_rate: 12000.0,
            month_rate: 300000.0,
            image: "http://link.com".to_string(),
            ..Car::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_one_no_rows_is_not_found() {
        let db = MockExecutor::new();
        let filter = CarFilter::by_id(1);
        db.expect_query(
            query::select_one("cars", Car::columns(), &filter.predicates()),
            vec![],
        );

        let err = repository(&db).fetch_one(&filter).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        db.verify().unwrap();
    }

    #[tokio::test]
    async fn test_fetch_one_store_error_is_get() {
        let db = MockExecutor::new();
        let filter = CarFilter::by_id(1);
        db.expect_query(
            query::select_one("cars", Car::columns(), &filter.predicates()),
            vec![],
        )
        .will_fail("error get data");

        let err = repository(&db).fetch_one(&filter).await.unwrap_err();
        assert!(matches!(err, Error::Get(ref msg) if msg.contains("error get data")));
    }

    #[tokio::test]
    async fn test_count_uses_filter_only() {
        let db = MockExecutor::new();
        db.expect_count(
            SqlQuery::new(
                "SELECT COUNT(*) FROM cars WHERE day_rate = $1 AND deleted_at IS NULL",
                vec![SqlValue::Float(12000.0)],
            ),
            4,
        );

        let filter = CarFilter {
            day_rate: Some(12000.0),
            ..CarFilter::default()
        };
        assert_eq!(repository(&db).count(&filter).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_insert_sets_generated_id() {
        let db = MockExecutor::new();
        let mut car = sedan();
        car.id = 0;

        let mut stamped = car.clone();
        stamped.audit.created_at = fixed_now();
        stamped.audit.updated_at = fixed_now();
        db.expect_begin()
            .expect_scalar(query::insert("cars", Car::columns(), &stamped.values()), 42)
            .expect_commit();

        repository(&db).insert(&mut car).await.expect("Failed to insert");
        assert_eq!(car.id, 42);
        assert_eq!(car.audit.created_at, fixed_now());
        db.verify().unwrap();
    }

    #[tokio::test]
    async fn test_update_failure_rolls_back() {
        let db = MockExecutor::new();
        let mut car = sedan();
        let mut stamped = car.clone();
        stamped.audit.updated_at = fixed_now();

        db.expect_begin()
            .expect_exec(query::update("cars", Car::columns(), &stamped.values(), 1), 0)
            .will_fail("deadlock detected")
            .expect_rollback();

        let err = repository(&db).update(&mut car).await.unwrap_err();
        assert!(matches!(err, Error::Update(ref msg) if msg.contains("deadlock detected")));
        assert_eq!(db.statements().last().map(String::as_str), Some("ROLLBACK"));
        assert_eq!(car.audit.updated_at, sedan().audit.updated_at);
    }

    #[tokio::test]
    async fn test_update_begin_failure_keeps_timestamp() {
        let db = MockExecutor::new();
        db.expect_begin().will_fail("too many connections");
        let mut car = sedan();

        let err = repository(&db).update(&mut car).await.unwrap_err();
        assert!(matches!(err, Error::Transaction(_)));
        assert_eq!(car.audit.updated_at, sedan().audit.updated_at);
    }

    #[tokio::test]
    async fn test_rollback_failure_keeps_statement_error() {
        let db = MockExecutor::new();
        db.expect_begin()
            .expect_exec(query::hard_delete("cars", 1), 0)
            .will_fail("foreign key violation")
            .expect_rollback()
            .will_fail("connection closed");

        let err = repository(&db)
            .delete(&mut sedan(), 1, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Delete(ref msg) if msg.contains("foreign key violation")));
    }

    #[tokio::test]
    async fn test_commit_failure_is_transaction_error() {
        let db = MockExecutor::new();
        db.expect_begin()
            .expect_exec(query::hard_delete("cars", 1), 1)
            .expect_commit()
            .will_fail("could not serialize access");

        let err = repository(&db)
            .delete(&mut sedan(), 1, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transaction(ref msg) if msg.starts_with("error commit")));
    }

    #[tokio::test]
    async fn test_soft_delete_marks_record() {
        let db = MockExecutor::new();
        db.expect_begin()
            .expect_exec(query::soft_delete("cars", 1, 7, fixed_now()), 1)
            .expect_commit();

        let mut car = sedan();
        repository(&db).delete(&mut car, 7, false).await.unwrap();

        assert_eq!(car.audit.deleted_by, Some(7));
        assert_eq!(car.audit.deleted_at, Some(fixed_now()));
        db.verify().unwrap();
    }

    #[tokio::test]
    async fn test_fetch_page_decodes_rows() {
        let db = MockExecutor::new();
        let statement = query::select_page("cars", Car::columns(), &Predicates::new(), &[], 10, 0);
        db.expect_query(statement, vec![sedan().to_row()]);

        let cars = repository(&db)
            .fetch_page(&CarFilter::default(), 0, 10, &[])
            .await
            .unwrap();
        assert_eq!(cars, vec![sedan()]);
    }
}
