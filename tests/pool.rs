//! End-to-end scenarios against an in-memory mock connection, covering the
//! six behaviors enumerated in spec.md §8: acquire-under-limit, blocking
//! wait + notify, overdue-checkout reclaim, bad-connection retry
//! exhaustion, force-close-all invalidation, and idle-gated liveness
//! probing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use connpool::{Error, PhysicalConnection, Pool, PoolOptions, Provider};

static LOG_INIT: Once = Once::new();

fn init_logging() {
    LOG_INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

#[derive(Debug)]
struct MockError(&'static str);

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for MockError {}

struct MockConnection {
    id: u64,
    closed: bool,
    auto_commit: bool,
    fail_ping: Arc<Mutex<bool>>,
    closed_ids: Arc<Mutex<Vec<u64>>>,
}

impl PhysicalConnection for MockConnection {
    type Error = MockError;

    fn is_closed(&self) -> Result<bool, Self::Error> {
        Ok(self.closed)
    }

    fn get_auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn rollback(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.closed = true;
        self.closed_ids.lock().unwrap().push(self.id);
        Ok(())
    }

    fn create_statement(&mut self, _sql: &str) -> Result<(), Self::Error> {
        if *self.fail_ping.lock().unwrap() {
            Err(MockError("ping failed"))
        } else {
            Ok(())
        }
    }

    fn identity_hash(&self) -> u64 {
        self.id
    }
}

struct MockProvider {
    next_id: AtomicU64,
    open_count: AtomicU64,
    fail_open: Mutex<bool>,
    fail_ping: Arc<Mutex<bool>>,
    closed_ids: Arc<Mutex<Vec<u64>>>,
}

impl MockProvider {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            open_count: AtomicU64::new(0),
            fail_open: Mutex::new(false),
            fail_ping: Arc::new(Mutex::new(false)),
            closed_ids: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn set_fail_ping(&self, fail: bool) {
        *self.fail_ping.lock().unwrap() = fail;
    }

    fn open_count(&self) -> u64 {
        self.open_count.load(Ordering::SeqCst)
    }

    fn closed_ids(&self) -> Vec<u64> {
        self.closed_ids.lock().unwrap().clone()
    }
}

impl Provider for MockProvider {
    type Connection = MockConnection;

    fn open(&self) -> Result<Self::Connection, MockError> {
        if *self.fail_open.lock().unwrap() {
            return Err(MockError("open failed"));
        }
        self.open_count.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            id,
            closed: false,
            auto_commit: true,
            fail_ping: Arc::clone(&self.fail_ping),
            closed_ids: Arc::clone(&self.closed_ids),
        })
    }
}

#[test]
fn acquire_reuses_released_connection_from_idle() {
    init_logging();
    let provider = MockProvider::new();
    let pool = Pool::new(provider, "mock://test");

    let first_id = {
        let guard = pool.acquire().unwrap();
        guard.identity_hash()
    };
    let second_id = {
        let guard = pool.acquire().unwrap();
        guard.identity_hash()
    };

    assert_eq!(first_id, second_id);

    let stats = pool.pool_stats();
    assert_eq!(stats.idle_count, 1);
    assert_eq!(stats.active_count, 0);
    assert_eq!(stats.request_count, 2);
}

#[test]
fn acquire_blocks_until_release_then_succeeds() {
    init_logging();
    let provider = MockProvider::new();
    let options = PoolOptions::new().max_active(1).wait(Duration::from_millis(500));
    let pool = Pool::with_options(provider, "mock://test", options);

    let held = pool.acquire().unwrap();

    let waiter_pool = pool.clone();
    let released_at = Arc::new(Mutex::new(None));
    let released_at_thread = Arc::clone(&released_at);

    let handle = std::thread::spawn(move || {
        let start = Instant::now();
        let _second = waiter_pool.acquire().unwrap();
        let unblocked_after = start.elapsed();
        *released_at_thread.lock().unwrap() = Some(unblocked_after);
    });

    std::thread::sleep(Duration::from_millis(50));
    drop(held);
    handle.join().unwrap();

    let elapsed = released_at.lock().unwrap().expect("waiter recorded its unblock time");
    assert!(elapsed < Duration::from_millis(500), "waiter should unblock well before the wait timeout");
}

#[test]
fn acquire_reclaims_overdue_active_connection() {
    init_logging();
    let provider = MockProvider::new();
    let options = PoolOptions::new()
        .max_active(1)
        .max_checkout(Duration::from_millis(20))
        .wait(Duration::from_millis(200));
    let pool = Pool::with_options(provider, "mock://test", options);

    let mut stale = pool.acquire().unwrap();
    std::thread::sleep(Duration::from_millis(40));

    let reclaimer = pool.acquire().unwrap();

    assert_eq!(stale.identity_hash(), reclaimer.identity_hash());
    assert!(!stale.is_valid(), "the overdue handle must be invalidated once reclaimed");
    assert!(reclaimer.is_valid());

    let err = stale.with_connection(|_| Ok::<(), MockError>(())).unwrap_err();
    assert!(matches!(err, Error::ConnectionInvalid));

    let stats = pool.pool_stats();
    assert_eq!(stats.claimed_overdue_connection_count, 1);
}

#[test]
fn acquire_exhausts_local_bad_connection_budget() {
    init_logging();
    let provider = MockProvider::new();
    provider.set_fail_ping(true);

    let options = PoolOptions::new()
        .max_active(5)
        .max_idle(2)
        .local_bad_tolerance(1)
        .ping_query("SELECT 1");
    let pool = Pool::with_options(provider, "mock://test", options);

    let err = pool.acquire().unwrap_err();
    assert!(matches!(err, Error::CouldNotGetGoodConnection(_)));

    if let Error::CouldNotGetGoodConnection(count) = err {
        assert_eq!(count, 4); // max_idle (2) + local_bad_tolerance (1) + 1
    }
}

#[test]
fn force_close_all_invalidates_outstanding_handles() {
    init_logging();
    let provider = MockProvider::new();
    let pool = Pool::new(provider, "mock://test");

    let mut guard = pool.acquire().unwrap();
    assert!(guard.is_valid());

    pool.force_close_all();

    assert!(!guard.is_valid());
    let err = guard.with_connection(|_| Ok::<(), MockError>(())).unwrap_err();
    assert!(matches!(err, Error::ConnectionInvalid));
}

#[test]
fn liveness_probe_skips_recently_used_connection() {
    init_logging();
    let provider = MockProvider::new();
    let fail_ping = Arc::clone(&provider.fail_ping);
    let options = PoolOptions::new()
        .ping_query("SELECT 1")
        .ping_idle_threshold(Duration::from_secs(60));
    let pool = Pool::with_options(provider, "mock://test", options);

    let first_id = {
        let guard = pool.acquire().unwrap();
        guard.identity_hash()
    };

    // The ping would fail if the probe actually ran; since the connection
    // was just used, the idle-time gate should skip the probe entirely and
    // hand the same connection back out.
    *fail_ping.lock().unwrap() = true;

    let second_id = {
        let guard = pool.acquire().unwrap();
        guard.identity_hash()
    };

    assert_eq!(first_id, second_id);
}

#[test]
fn open_failure_propagates_as_error_open() {
    init_logging();
    let provider = MockProvider::new();
    *provider.fail_open.lock().unwrap() = true;
    let pool = Pool::new(provider, "mock://test");

    let err = pool.acquire().unwrap_err();
    assert!(matches!(err, Error::Open(_)));
}

#[test]
fn shutdown_closes_idle_connections_and_wakes_waiters() {
    init_logging();
    let provider = MockProvider::new();
    let options = PoolOptions::new().max_active(1).wait(Duration::from_millis(500));
    let pool = Pool::with_options(provider, "mock://test", options);

    let first_id = {
        let guard = pool.acquire().unwrap();
        guard.identity_hash()
    };
    let _ = first_id;

    let held = pool.acquire().unwrap();

    let waiter_pool = pool.clone();
    let handle = std::thread::spawn(move || waiter_pool.acquire());

    std::thread::sleep(Duration::from_millis(50));
    pool.shutdown();

    let result = handle.join().unwrap();
    assert!(matches!(result, Err(Error::Interrupted)));

    drop(held);

    let err = pool.acquire().unwrap_err();
    assert!(matches!(err, Error::Interrupted));
}

#[test]
fn released_connection_beyond_max_idle_is_closed_not_recycled() {
    init_logging();
    let provider = MockProvider::new();
    let options = PoolOptions::new().max_active(4).max_idle(1);
    let pool = Pool::with_options(provider, "mock://test", options);

    let a = pool.acquire().unwrap();
    let b = pool.acquire().unwrap();
    let c = pool.acquire().unwrap();

    drop(a);
    drop(b);
    drop(c);

    let stats = pool.pool_stats();
    assert_eq!(stats.idle_count, 1, "only max_idle connections should be retained");
}
