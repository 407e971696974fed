//! The single entry point guarded datastore calls go through.
//!
//! [`ResilientExecutor`] nests a [`RetryPolicy`] inside a [`CircuitBreaker`]:
//! transient failures are retried within a short budget, and only the final
//! outcome of the retried sequence is reported to the breaker. Once the
//! breaker has tripped, calls fail fast with
//! [`ResilienceError::CircuitOpen`] without touching the dependency.
//!
//! ```rust
//! use std::time::Duration;
//! use storeguard_executor::{DatastoreFault, ResilientExecutor};
//!
//! #[derive(Debug)]
//! enum DbError {
//!     Unreachable,
//!     TimedOut,
//! }
//! # impl std::fmt::Display for DbError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str("db") }
//! # }
//!
//! impl DatastoreFault for DbError {
//!     fn is_transient(&self) -> bool {
//!         true
//!     }
//!
//!     fn timed_out(_after: Duration) -> Self {
//!         DbError::TimedOut
//!     }
//! }
//!
//! # async fn example() {
//! let executor = ResilientExecutor::<DbError>::for_datastore();
//!
//! match executor.execute(|| async { Ok::<_, DbError>(vec!["milk", "eggs"]) }).await {
//!     Ok(rows) => println!("{} rows", rows.len()),
//!     Err(e) if e.is_fail_fast() => println!("datastore unavailable, try later"),
//!     Err(e) => println!("query failed: {e}"),
//! }
//! # }
//! ```
//!
//! # Feature Flags
//! - `metrics`: forwards to the breaker and retry crates
//! - `tracing`: forwards to the breaker and retry crates and logs fail-fast
//!   rejections at DEBUG
//!
//! [`RetryPolicy`]: storeguard_retry::RetryPolicy
//! [`CircuitBreaker`]: storeguard_circuitbreaker::CircuitBreaker

mod executor;

pub use executor::{DatastoreFault, ResilientExecutor};
pub use storeguard_core::ResilienceError;
