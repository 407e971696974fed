//! Routed, guarded access to a primary database and an optional read replica.
//!
//! - [`ConnectionInitializer`] opens the pools at startup under a long retry
//!   budget. Losing the primary is fatal; losing the replica only sends
//!   reads to the primary.
//! - [`ConnectionRouter`] hands writes the primary and reads the replica (or
//!   the primary when there is none).
//! - [`Datastore`] runs every operation through a [`ResilientExecutor`], so
//!   transient errors are retried and sustained ones trip the breaker.
//! - [`Datastore::health`] pings the pools directly.
//!
//! ```rust,no_run
//! use storeguard_datastore::{ConnectionInitializer, Datastore, DatabaseConfig, PgConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DatabaseConfig::from_urls("postgres://app@db:5432/todos", None)?;
//! let router = ConnectionInitializer::new(PgConnector).initialize(&config).await?;
//! let store = Datastore::new(router);
//!
//! let count: i64 = store
//!     .execute_read(|pool| async move {
//!         let row = pool.query_one("SELECT count(*) FROM todos", &[]).await?;
//!         Ok(row.get(0))
//!     })
//!     .await?;
//! println!("{count} todos");
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//! - `postgres` (default): [`PgConnector`] and [`PgPool`]
//! - `metrics`: breaker and retry metrics
//! - `resilience-tracing`: breaker and retry logs
//!
//! [`ResilientExecutor`]: storeguard_executor::ResilientExecutor

mod config;
mod datastore;
mod error;
mod health;
mod initializer;
mod pool;
#[cfg(feature = "postgres")]
mod postgres;
mod router;


pub use config::{DatabaseConfig, Endpoint, EndpointRole};
pub use datastore::{Datastore, DatastoreResult};
pub use error::{ConnectionInitError, DatastoreError};
pub use health::{HealthReport, ReplicaHealth};
pub use initializer::ConnectionInitializer;
pub use pool::{ConnectionPool, Connector};
pub use router::{ConnectionRouter, ReplicaStatus};
pub use storeguard_core::ResilienceError;

#[cfg(feature = "postgres")]
pub use postgres::{PgConnector, PgPool};
#[cfg(feature = "postgres")]
pub use tokio_postgres::{
    types::{FromSql, ToSql},
    Row,
};
