use std::time::Duration;
use storeguard_executor::DatastoreFault;
use thiserror::Error;

/// Errors raised by a connection pool or a query against it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatastoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("pool error: {0}")]
    Pool(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl DatastoreError {
    /// Whether another attempt may succeed. Configuration errors never will.
    pub fn is_transient(&self) -> bool {
        !matches!(self, DatastoreError::Config(_))
    }
}

impl DatastoreFault for DatastoreError {
    fn is_transient(&self) -> bool {
        DatastoreError::is_transient(self)
    }

    fn timed_out(after: Duration) -> Self {
        DatastoreError::Connection(format!("no response after {}ms", after.as_millis()))
    }
}

/// Startup failures.
#[derive(Error, Debug)]
pub enum ConnectionInitError {
    /// The primary could not be reached within the startup retry budget.
    /// The service cannot run without it.
    #[error("could not connect to the primary database at {endpoint}: {source}")]
    Primary {
        endpoint: String,
        #[source]
        source: DatastoreError,
    },
}
