use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sqlock_common::ErrorCode;
use sqlock_core::{
    DatabaseLock, ExpirationTimeout, LeasePolicy, Lock, LockDescriptor, LockProperties,
    LockService, SqliteQueryAdapter, SqlxStatementExecutor, StatementExecutor,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite};
use tokio::runtime::Runtime;

const DDL: &str = "CREATE TABLE locks (\
    lock_id TEXT PRIMARY KEY, \
    consumer_id TEXT NOT NULL, \
    expires_at INTEGER NOT NULL, \
    exclusive INTEGER NOT NULL DEFAULT 0)";

// The pool goes before the runtime it was created on.
struct Fixture {
    executor: Arc<SqlxStatementExecutor<Sqlite>>,
    runtime: Runtime,
}

impl Fixture {
    fn new() -> Self {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .is_test(true)
            .try_init();

        let runtime = Runtime::new().unwrap();
        // A single pinned connection keeps the in-memory database alive for the whole test.
        let pool = runtime
            .block_on(
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect("sqlite::memory:"),
            )
            .unwrap();
        runtime
            .block_on(sqlx::query(DDL).execute(&pool))
            .unwrap();
        let executor = Arc::new(SqlxStatementExecutor::new(pool, runtime.handle().clone()));
        Self { executor, runtime }
    }

    fn lock(&self, consumer_id: &str, expiration_timeout: ExpirationTimeout) -> DatabaseLock {
        let descriptor = LockDescriptor::builder("orders")
            .consumer_id(consumer_id)
            .retry_count(0)
            .retry_delay(Duration::from_millis(10))
            .build()
            .unwrap();
        DatabaseLock::new(
            descriptor,
            LeasePolicy::new(expiration_timeout).unwrap(),
            Arc::new(SqliteQueryAdapter::default()),
            self.executor.clone(),
        )
    }

    fn row(&self) -> Option<(String, bool)> {
        self.runtime
            .block_on(
                sqlx::query("SELECT consumer_id, exclusive FROM locks WHERE lock_id = 'orders'")
                    .fetch_optional(self.executor.pool()),
            )
            .unwrap()
            .map(|row| {
                let consumer: String = row.get(0);
                let exclusive: i64 = row.get(1);
                (consumer, exclusive != 0)
            })
    }
}

#[test]
fn claims_exclude_and_release_frees() {
    let fixture = Fixture::new();
    let a = fixture.lock("a", ExpirationTimeout::DEFAULT);
    let b = fixture.lock("b", ExpirationTimeout::DEFAULT);

    assert!(fixture.row().is_none());
    assert!(a.try_lock().unwrap());
    assert_eq!(fixture.row(), Some(("a".to_string(), false)));
    assert!(!b.try_lock().unwrap());

    // Renewal hits the existing row.
    assert!(a.try_lock().unwrap());
    assert!(!b.try_lock().unwrap());

    a.unlock().unwrap();
    assert!(b.try_lock().unwrap());
    assert_eq!(fixture.row(), Some(("b".to_string(), false)));
}

#[test]
fn lease_expires_on_the_database_clock() {
    let fixture = Fixture::new();
    let timeout = ExpirationTimeout::finite(Duration::from_millis(200)).unwrap();
    let a = fixture.lock("a", timeout);
    let b = fixture.lock("b", timeout);

    assert!(a.try_lock().unwrap());
    assert!(!b.try_lock().unwrap());
    thread::sleep(Duration::from_millis(300));
    assert!(b.try_lock().unwrap());

    let err = a.unlock().unwrap_err();
    assert_eq!(err.code(), ErrorCode::IllegalOwnershipStateCode());
}

#[test]
fn exclusive_row_survives_its_holder() {
    let fixture = Fixture::new();
    let a = fixture.lock("a", ExpirationTimeout::Infinite);
    let b = fixture.lock("b", ExpirationTimeout::DEFAULT);

    assert!(a.try_lock().unwrap());
    assert_eq!(fixture.row(), Some(("a".to_string(), true)));
    assert!(!b.try_lock_for(Duration::from_millis(50)).unwrap());

    a.unlock().unwrap();
    assert_eq!(fixture.row(), Some(("a".to_string(), false)));
    assert!(b.try_lock().unwrap());
}

#[test]
fn lock_service_over_sqlite() {
    let fixture = Fixture::new();
    let properties = LockProperties {
        retry_count: 1,
        retry_delay_ms: 10,
        ..Default::default()
    };
    let first = LockService::new(
        Arc::new(SqliteQueryAdapter::default()),
        fixture.executor.clone(),
        properties.clone(),
    )
    .unwrap();
    let second = LockService::new(
        Arc::new(SqliteQueryAdapter::default()),
        fixture.executor.clone(),
        properties,
    )
    .unwrap();

    assert!(first.acquire_lock("orders").unwrap());
    assert!(!second.acquire_lock("orders").unwrap());
    assert_eq!(
        second.release_lock("orders").unwrap_err().code(),
        ErrorCode::IllegalOwnershipStateCode()
    );
    first.release_lock("orders").unwrap();
    assert!(second
        .acquire_lock_try_time("orders", Duration::from_millis(100))
        .unwrap());
}

#[test]
fn broken_table_surfaces_store_error() {
    let fixture = Fixture::new();
    fixture
        .runtime
        .block_on(sqlx::query("DROP TABLE locks").execute(fixture.executor.pool()))
        .unwrap();
    let a = fixture.lock("a", ExpirationTimeout::DEFAULT);

    let err = a.try_lock().unwrap_err();
    assert_eq!(err.code(), ErrorCode::StoreErrorCode());
    assert!(err.cause().is_some());

    // The raw executor reports the same failure class.
    let statement = sqlock_core::QueryAdapter::build_release(
        &SqliteQueryAdapter::default(),
        "orders",
        "a",
    );
    assert_eq!(
        fixture.executor.execute(&statement).unwrap_err().code(),
        ErrorCode::StoreErrorCode()
    );
}
