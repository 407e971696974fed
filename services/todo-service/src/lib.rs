//! A todo list web service on top of the storeguard datastore.
//!
//! Handlers reach PostgreSQL only through [`storeguard_datastore::Datastore`],
//! so every query is retried within the request budget and guarded by the
//! `DatabaseCB` circuit breaker. Lists are served from the read replica when
//! one connected at startup.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod store;
pub mod telemetry;

pub use app::{router, AppState};
pub use store::{PgTodoStore, Todo, TodoStore};
