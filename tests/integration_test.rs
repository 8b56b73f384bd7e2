//! Integration tests for carrent-core
//!
//! These tests drive the resource managers end to end over the scripted
//! `MockExecutor` and a `RecordingBackend`, checking both the SQL sent to
//! the store and the exact cache traffic.

use carrent_core::backend::{CacheBackend, CacheOp, OpKind, RecordingBackend};
use carrent_core::config::ResourceConfig;
use carrent_core::model::{Car, CarFilter, Entity, Filter, Order, OrderFilter, PageFilter, Pagination};
use carrent_core::query;
use carrent_core::store::MockExecutor;
use carrent_core::{
    CacheControl, CacheKeyBuilder, CarManager, Error, ResourceManager, SqlRepository,
};
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

const TTL: Duration = Duration::from_secs(30);

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 2, 22, 2, 0, 0).unwrap()
}

fn car_manager(
    db: &MockExecutor,
    backend: &RecordingBackend,
) -> CarManager<SqlRepository<Car, MockExecutor>, RecordingBackend> {
    ResourceManager::new(
        SqlRepository::new(db.clone()).with_clock(fixed_now),
        backend.clone(),
        ResourceConfig::new(10, TTL),
    )
}

fn sedan(id: i64) -> Car {
    Car {
        id,
        car_name: "sedan".to_string(),
        day_rate: 12000.0,
        month_rate: 300000.0,
        image: "http://link.com".to_string(),
        ..Car::default()
    }
}

fn day_rate_filter() -> CarFilter {
    CarFilter {
        day_rate: Some(12000.0),
        ..CarFilter::default()
    }
}

/// Test 1: Must-revalidate single lookup
///
/// The store is read and the single-result key receives DEL then SET with
/// the configured TTL, holding the JSON of the returned row.
#[tokio::test]
async fn test_must_revalidate_single_rewrites_cache() {
    init_logger();
    let db = MockExecutor::new();
    let backend = RecordingBackend::new();
    let filter = day_rate_filter();
    db.expect_query(
        query::select_one("cars", Car::columns(), &filter.predicates()),
        vec![sedan(1).to_row()],
    );

    let car = car_manager(&db, &backend)
        .get_single_by_param(CacheControl::from("must-revalidate"), &filter)
        .await
        .expect("Failed to get car");

    let key = r#"gspCar:{"id":null,"car_name":null,"day_rate":12000,"day_rate_gt":null,"day_rate_gte":null,"day_rate_lt":null,"day_rate_lte":null,"month_rate":null,"month_rate_gt":null,"month_rate_gte":null,"month_rate_lt":null,"month_rate_lte":null,"image":null}"#;
    assert_eq!(car, sedan(1));
    assert_eq!(
        backend.ops(),
        vec![
            CacheOp::Del(key.to_string()),
            CacheOp::Set {
                key: key.to_string(),
                value: serde_json::to_string(&sedan(1)).unwrap(),
                ttl: TTL,
            },
        ]
    );
    db.verify().unwrap();
}

/// Test 2: Cache hit never reaches the store
#[tokio::test]
async fn test_cache_hit_skips_store() {
    init_logger();
    let db = MockExecutor::new();
    let backend = RecordingBackend::new();
    let filter = CarFilter::by_id(1);
    backend
        .inner()
        .set(
            &CacheKeyBuilder::single::<Car>(&filter).unwrap(),
            serde_json::to_string(&sedan(1)).unwrap(),
            TTL,
        )
        .await
        .unwrap();

    let car = car_manager(&db, &backend)
        .get_single_by_param(CacheControl::PreferCache, &filter)
        .await
        .unwrap();

    assert_eq!(car, sedan(1));
    assert!(db.statements().is_empty());
    assert_eq!(backend.ops().len(), 1);
}

/// Test 3: A missing data entry invalidates the whole list pair
///
/// The pagination entry is present but the data entry is not: the store is
/// queried and both entries are rewritten, data first.
#[tokio::test]
async fn test_list_data_miss_rewrites_pair() {
    init_logger();
    let db = MockExecutor::new();
    let backend = RecordingBackend::new();
    let filter = PageFilter::new(day_rate_filter());
    let (data_key, pg_key) = CacheKeyBuilder::list_pair::<Car>(&filter).unwrap();

    backend
        .inner()
        .set(
            &pg_key,
            serde_json::to_string(&Pagination::new(1, 10, 1, 1, "")).unwrap(),
            TTL,
        )
        .await
        .unwrap();

    let predicates = filter.filter.predicates();
    db.expect_count(query::count("cars", &predicates), 1)
        .expect_query(
            query::select_page("cars", Car::columns(), &predicates, &[], 10, 0),
            vec![sedan(1).to_row()],
        );

    let (cars, pagination) = car_manager(&db, &backend)
        .get_by_param(CacheControl::PreferCache, &filter)
        .await
        .unwrap();

    assert_eq!(cars, vec![sedan(1)]);
    assert_eq!(pagination.total_elements, 1);
    let writes: Vec<String> = backend
        .ops()
        .into_iter()
        .filter(|op| !matches!(op, CacheOp::Get(_)))
        .map(|op| match op {
            CacheOp::Del(key) => format!("DEL {}", key),
            CacheOp::Set { key, .. } => format!("SET {}", key),
            CacheOp::Get(key) => key,
        })
        .collect();
    assert_eq!(
        writes,
        vec![
            format!("DEL {}", data_key),
            format!("SET {}", data_key),
            format!("DEL {}", pg_key),
            format!("SET {}", pg_key),
        ]
    );
    db.verify().unwrap();
}

/// Test 4: Hard and soft delete statements
#[tokio::test]
async fn test_hard_and_soft_delete_statements() {
    init_logger();
    let backend = RecordingBackend::new();

    let db = MockExecutor::new();
    db.expect_begin()
        .expect_exec(query::hard_delete("cars", 1), 1)
        .expect_commit();
    car_manager(&db, &backend)
        .delete(&mut sedan(1), 3, true)
        .await
        .unwrap();
    assert_eq!(
        db.statements(),
        vec!["BEGIN", "DELETE FROM cars WHERE id = $1", "COMMIT"]
    );

    let db = MockExecutor::new();
    db.expect_begin()
        .expect_exec(query::soft_delete("cars", 1, 3, fixed_now()), 1)
        .expect_commit();
    car_manager(&db, &backend)
        .delete(&mut sedan(1), 3, false)
        .await
        .unwrap();
    let statements = db.statements();
    assert_eq!(statements.len(), 3);
    assert!(statements[1].starts_with("UPDATE cars SET deleted_by = $1, deleted_at = $2"));
    assert!(!statements.iter().any(|s| s.starts_with("DELETE")));

    assert!(backend.ops().is_empty());
}

/// Test 5: A failed BEGIN stops the mutation
#[tokio::test]
async fn test_begin_failure_attempts_no_query() {
    init_logger();
    let db = MockExecutor::new();
    let backend = RecordingBackend::new();
    db.expect_begin().will_fail("connection refused");

    let mut car = sedan(0);
    let err = car_manager(&db, &backend)
        .insert(&mut car)
        .await
        .unwrap_err();

    match err {
        Error::Transaction(msg) => {
            assert!(msg.starts_with("error begin transaction"));
            assert!(msg.contains("connection refused"));
        }
        other => panic!("expected a transaction error, got {:?}", other),
    }
    assert_eq!(db.statements(), vec!["BEGIN"]);
    assert_eq!(car.id, 0);
}

/// Test 6: A full last page still counts one more page
#[tokio::test]
async fn test_pagination_exact_multiple() {
    init_logger();
    let db = MockExecutor::new();
    let backend = RecordingBackend::new();
    let filter = PageFilter::new(CarFilter::default()).with_order_by("day_rate DESC, car_name");
    let order = query::parse_order_by("day_rate DESC, car_name", Car::columns()).unwrap();
    let predicates = filter.filter.predicates();
    db.expect_count(query::count("cars", &predicates), 10)
        .expect_query(
            query::select_page("cars", Car::columns(), &predicates, &order, 10, 0),
            (1..=10).map(|id| sedan(id).to_row()).collect(),
        );

    let (cars, pagination) = car_manager(&db, &backend)
        .get_by_param(CacheControl::MustRevalidate, &filter)
        .await
        .unwrap();

    assert_eq!(cars.len(), 10);
    assert_eq!(
        pagination,
        Pagination {
            current_page: 1,
            current_elements: 10,
            total_pages: 2,
            total_elements: 10,
            sort_by: "day_rate DESC, car_name".to_string(),
        }
    );
}

/// Test 7: Revalidating twice against an unchanged store is idempotent
#[tokio::test]
async fn test_must_revalidate_list_is_idempotent() {
    init_logger();
    let db = MockExecutor::new();
    let backend = RecordingBackend::new();
    let filter = PageFilter::new(CarFilter::default()).with_limit(2).with_page(2);
    let predicates = filter.filter.predicates();
    for _ in 0..2 {
        db.expect_count(query::count("cars", &predicates), 3)
            .expect_query(
                query::select_page("cars", Car::columns(), &predicates, &[], 2, 2),
                vec![sedan(3).to_row()],
            );
    }

    let cars = car_manager(&db, &backend);
    let first = cars
        .get_by_param(CacheControl::MustRevalidate, &filter)
        .await
        .unwrap();
    let second = cars
        .get_by_param(CacheControl::MustRevalidate, &filter)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.1.total_pages, 2);
    assert_eq!(first.1.current_page, 2);
    db.verify().unwrap();
}

/// Test 8: A cache write failure after a successful read fails the call
#[tokio::test]
async fn test_cache_set_failure_is_surfaced() {
    init_logger();
    let db = MockExecutor::new();
    let backend = RecordingBackend::new();
    let filter = CarFilter::by_id(1);
    backend.fail_on(OpKind::Set, CacheKeyBuilder::single::<Car>(&filter).unwrap());
    db.expect_query(
        query::select_one("cars", Car::columns(), &filter.predicates()),
        vec![sedan(1).to_row()],
    );

    let err = car_manager(&db, &backend)
        .get_single_by_param(CacheControl::PreferCache, &filter)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BackendError(_)));
    assert_eq!(err.status_code(), 500);
    db.verify().unwrap();
}

/// Test 9: A cache read error other than a miss does not fall back
#[tokio::test]
async fn test_cache_read_error_skips_store() {
    init_logger();
    let db = MockExecutor::new();
    let backend = RecordingBackend::new();
    let filter = CarFilter::by_id(1);
    backend.fail_on(OpKind::Get, CacheKeyBuilder::single::<Car>(&filter).unwrap());

    let err = car_manager(&db, &backend)
        .get_single_by_param(CacheControl::PreferCache, &filter)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BackendError(_)));
    assert!(db.statements().is_empty());
}

/// Test 10: Not found is reported as 404 and leaves the cache alone
#[tokio::test]
async fn test_order_not_found() {
    init_logger();
    let db = MockExecutor::new();
    let backend = RecordingBackend::new();
    let filter = OrderFilter::by_id(77);
    db.expect_query(
        query::select_one("orders", Order::columns(), &filter.predicates()),
        vec![],
    );

    let orders = ResourceManager::new(
        SqlRepository::<Order, _>::new(db.clone()),
        backend.clone(),
        ResourceConfig::default(),
    );
    let err = orders
        .get_single_by_param(CacheControl::PreferCache, &filter)
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 404);
    assert_eq!(err.message().code, 404000);
    assert_eq!(
        backend.ops(),
        vec![CacheOp::Get(
            CacheKeyBuilder::single::<Order>(&filter).unwrap()
        )]
    );
    assert!(backend.ops()[0].key().starts_with("gspOrder:{\"id\":77,"));
}
