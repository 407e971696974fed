//! The contract a connection pool has to meet to sit behind the router.

use crate::config::Endpoint;
use crate::error::DatastoreError;
use std::future::Future;

/// A pool of connections to one database endpoint.
///
/// Query methods are left to the concrete pool; the resilience layer only
/// needs to check liveness and shut the pool down.
pub trait ConnectionPool: Send + Sync + 'static {
    /// Round-trips to the database.
    fn ping(&self) -> impl Future<Output = Result<(), DatastoreError>> + Send;

    /// Closes the pool. Pending and future checkouts fail.
    fn close(&self);
}

/// Opens pools for endpoints.
pub trait Connector: Send + Sync {
    type Pool: ConnectionPool;

    /// Creates a pool for `endpoint`. Implementations may connect lazily;
    /// the initializer pings the pool before using it.
    fn open(&self, endpoint: &Endpoint) -> impl Future<Output = Result<Self::Pool, DatastoreError>> + Send;
}
