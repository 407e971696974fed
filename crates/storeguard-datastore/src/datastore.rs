use crate::error::DatastoreError;
use crate::health::{self, HealthReport};
use crate::pool::ConnectionPool;
use crate::router::ConnectionRouter;
use std::future::Future;
use std::sync::Arc;
use storeguard_core::ResilienceError;
use storeguard_executor::ResilientExecutor;

/// Result of a guarded datastore operation.
pub type DatastoreResult<T> = Result<T, ResilienceError<DatastoreError>>;

/// The datastore as request handlers see it: routed pools behind one
/// breaker and the request-path retry budget.
///
/// Built once at startup and shared; clones share the router and the
/// breaker state.
pub struct Datastore<P> {
    router: Arc<ConnectionRouter<P>>,
    executor: ResilientExecutor<DatastoreError>,
}

impl<P: ConnectionPool> Datastore<P> {
    /// Uses [`ResilientExecutor::for_datastore`]: the `DatabaseCB` breaker
    /// and the request-path retry profile. Configuration errors are returned
    /// without retrying, and an attempt still running when the retry budget
    /// ends fails as a connection error.
    pub fn new(router: ConnectionRouter<P>) -> Self {
        Self::with_executor(router, ResilientExecutor::for_datastore())
    }

    pub fn with_executor(
        router: ConnectionRouter<P>,
        executor: ResilientExecutor<DatastoreError>,
    ) -> Self {
        Self {
            router: Arc::new(router),
            executor,
        }
    }

    /// Runs a read against the replica, or the primary if reads alias it.
    ///
    /// `op` is called once per attempt with the same handle.
    pub async fn execute_read<T, F, Fut>(&self, mut op: F) -> DatastoreResult<T>
    where
        F: FnMut(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T, DatastoreError>>,
    {
        let pool = self.router.for_read();
        self.executor.execute(|| op(Arc::clone(&pool))).await
    }

    /// Runs a write against the primary.
    pub async fn execute_write<T, F, Fut>(&self, mut op: F) -> DatastoreResult<T>
    where
        F: FnMut(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T, DatastoreError>>,
    {
        let pool = self.router.for_write();
        self.executor.execute(|| op(Arc::clone(&pool))).await
    }

    pub async fn health(&self) -> HealthReport {
        health::check(&self.router).await
    }

    pub fn router(&self) -> &ConnectionRouter<P> {
        &self.router
    }

    pub fn executor(&self) -> &ResilientExecutor<DatastoreError> {
        &self.executor
    }

    pub fn close(&self) {
        self.router.close();
    }
}

impl<P> Clone for Datastore<P> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            executor: self.executor.clone(),
        }
    }
}

impl<P> std::fmt::Debug for Datastore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datastore")
            .field("router", &self.router)
            .field("executor", &self.executor)
            .finish()
    }
}
