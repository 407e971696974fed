use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use storeguard_datastore::{ConnectionPool, Connector, DatastoreError, Endpoint};
use storeguard_executor::DatastoreFault;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DbError {
    #[error("connection refused")]
    Refused,
    #[error("syntax error")]
    Syntax,
}

impl DatastoreFault for DbError {
    fn is_transient(&self) -> bool {
        *self == DbError::Refused
    }

    fn timed_out(_after: Duration) -> Self {
        DbError::Refused
    }
}

/// `true` when `elapsed` is `expected_ms` give or take scheduler slack.
pub fn within(elapsed: Duration, expected_ms: u64) -> bool {
    let expected = Duration::from_millis(expected_ms);
    elapsed >= expected && elapsed < expected + Duration::from_millis(10)
}

/// An operation that fails `failures` times before succeeding.
pub struct Flaky {
    calls: AtomicUsize,
    failures: usize,
}

impl Flaky {
    pub fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failures,
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::new(usize::MAX)
    }

    pub async fn call(&self) -> Result<&'static str, DbError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            Err(DbError::Refused)
        } else {
            Ok("row")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// A pool that answers pings while its endpoint is up.
#[derive(Debug)]
pub struct TestPool {
    pub host: String,
    up: Arc<AtomicBool>,
    pub closed: AtomicBool,
}

impl ConnectionPool for TestPool {
    async fn ping(&self) -> Result<(), DatastoreError> {
        if self.up.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatastoreError::Connection(format!("{}: connection refused", self.host)))
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Opens [`TestPool`]s; the primary and replica can be taken down
/// independently.
#[derive(Debug)]
pub struct TestConnector {
    primary_up: Arc<AtomicBool>,
    replica_up: Arc<AtomicBool>,
}

impl TestConnector {
    pub fn new() -> Self {
        Self {
            primary_up: Arc::new(AtomicBool::new(true)),
            replica_up: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_primary_up(&self, up: bool) {
        self.primary_up.store(up, Ordering::SeqCst);
    }

    pub fn set_replica_up(&self, up: bool) {
        self.replica_up.store(up, Ordering::SeqCst);
    }
}

impl Connector for TestConnector {
    type Pool = TestPool;

    async fn open(&self, endpoint: &Endpoint) -> Result<TestPool, DatastoreError> {
        let up = if endpoint.host == "replica" {
            &self.replica_up
        } else {
            &self.primary_up
        };
        Ok(TestPool {
            host: endpoint.host.clone(),
            up: Arc::clone(up),
            closed: AtomicBool::new(false),
        })
    }
}
