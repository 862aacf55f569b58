use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sqlock_common::{ErrorCode, SqlockResult};
use sqlock_core::{
    DatabaseLock, LeasePolicy, Lock, LockDescriptor, MemoryLeaseStore, MySqlQueryAdapter, Route,
    SerialAccessPolicy,
};

#[derive(Default)]
struct FlagRoute {
    id: String,
    running: AtomicBool,
    starts: AtomicUsize,
}

impl FlagRoute {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            ..Default::default()
        })
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Route for FlagRoute {
    fn id(&self) -> &str {
        &self.id
    }

    fn start(&self) -> SqlockResult<()> {
        if !self.running.swap(true, Ordering::SeqCst) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn stop(&self) -> SqlockResult<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}

fn lock_on(store: &Arc<MemoryLeaseStore>, consumer_id: &str) -> Arc<dyn Lock> {
    let descriptor = LockDescriptor::builder("routes")
        .consumer_id(consumer_id)
        .retry_count(0)
        .retry_delay(Duration::from_millis(5))
        .build()
        .unwrap();
    Arc::new(DatabaseLock::new(
        descriptor,
        LeasePolicy::default(),
        Arc::new(MySqlQueryAdapter::default()),
        store.clone(),
    ))
}

/// Parks the first `try_lock` until the test lets it through.
struct GatedLock {
    inner: Arc<dyn Lock>,
    gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl Lock for GatedLock {
    fn lock(&self) -> SqlockResult<()> {
        self.inner.lock()
    }

    fn lock_interruptibly(&self) -> SqlockResult<()> {
        self.inner.lock_interruptibly()
    }

    fn try_lock(&self) -> SqlockResult<bool> {
        let gate = self.gate.lock().take();
        if let Some((entered, proceed)) = gate {
            entered.send(()).unwrap();
            proceed.recv().unwrap();
        }
        self.inner.try_lock()
    }

    fn try_lock_for(&self, timeout: Duration) -> SqlockResult<bool> {
        self.inner.try_lock_for(timeout)
    }

    fn unlock(&self) -> SqlockResult<()> {
        self.inner.unlock()
    }
}

fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn zero_obtain_delay_is_rejected() {
    let store = Arc::new(MemoryLeaseStore::new());
    let err = SerialAccessPolicy::new(lock_on(&store, "a"), Duration::ZERO)
        .err()
        .unwrap();
    assert_eq!(err.code(), ErrorCode::ValidationErrorCode());
}

#[test]
fn routes_run_in_one_process_only() {
    init_logger();
    let store = Arc::new(MemoryLeaseStore::new());
    let delay = Duration::from_millis(20);

    let first = SerialAccessPolicy::new(lock_on(&store, "a"), delay).unwrap();
    let first_route = FlagRoute::new("ingest");
    first.on_init(first_route.clone());
    eventually("first route", || first_route.is_running());
    assert!(first.is_holding());

    let second = SerialAccessPolicy::new(lock_on(&store, "b"), delay).unwrap();
    let second_route = FlagRoute::new("ingest");
    second.on_init(second_route.clone());
    thread::sleep(delay * 8);
    assert!(!second_route.is_running());
    assert!(!second.is_holding());
    assert_eq!(store.record("routes").unwrap().consumer_id, "a");

    first.shutdown().unwrap();
    assert!(!first_route.is_running());
    assert!(!first.is_holding());
    eventually("second route", || second_route.is_running());
    assert_eq!(store.record("routes").unwrap().consumer_id, "b");

    // Renewals do not restart a running route.
    thread::sleep(delay * 5);
    assert_eq!(second_route.starts.load(Ordering::SeqCst), 1);
    assert_eq!(first_route.starts.load(Ordering::SeqCst), 1);

    // Idempotent.
    first.shutdown().unwrap();
}

#[test]
fn removing_routes_keeps_the_rest() {
    init_logger();
    let store = Arc::new(MemoryLeaseStore::new());
    let policy = SerialAccessPolicy::new(lock_on(&store, "a"), Duration::from_millis(20)).unwrap();
    let ingest = FlagRoute::new("ingest");
    let export = FlagRoute::new("export");
    policy.on_init(ingest.clone());
    policy.on_init(export.clone());
    eventually("both routes", || ingest.is_running() && export.is_running());

    policy.on_remove("ingest").unwrap();
    assert_eq!(policy.route_ids(), vec!["export".to_string()]);
    thread::sleep(Duration::from_millis(60));
    assert!(export.is_running());
    assert!(policy.is_holding());
}

#[test]
fn idle_policy_never_touches_the_store() {
    init_logger();
    let store = Arc::new(MemoryLeaseStore::new());
    let policy = SerialAccessPolicy::new(lock_on(&store, "a"), Duration::from_millis(10)).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(store.record("routes").is_none());
    drop(policy);
    assert!(store.record("routes").is_none());
}

#[test]
fn removal_during_a_tick_leaves_the_lock_free() {
    init_logger();
    let store = Arc::new(MemoryLeaseStore::new());
    let (entered_tx, entered_rx) = mpsc::channel();
    let (proceed_tx, proceed_rx) = mpsc::channel();
    let lock = Arc::new(GatedLock {
        inner: lock_on(&store, "a"),
        gate: Mutex::new(Some((entered_tx, proceed_rx))),
    });
    let policy = Arc::new(SerialAccessPolicy::new(lock, Duration::from_millis(20)).unwrap());
    let route = FlagRoute::new("ingest");
    policy.on_init(route.clone());

    // The monitor is inside its first claim for ["ingest"].
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let remover = {
        let policy = Arc::clone(&policy);
        thread::spawn(move || policy.on_remove("ingest"))
    };
    thread::sleep(Duration::from_millis(50));
    proceed_tx.send(()).unwrap();
    remover.join().unwrap().unwrap();

    thread::sleep(Duration::from_millis(100));
    assert!(policy.route_ids().is_empty());
    assert!(!route.is_running());
    assert!(!policy.is_holding());
    let record = store.record("routes").unwrap();
    assert!(record.expires_at <= store.now());

    // Another process gets the lock right away.
    assert!(lock_on(&store, "b").try_lock().unwrap());
}
