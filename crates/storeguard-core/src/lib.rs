//! Core infrastructure shared by the storeguard crates.
//!
//! - [`events`]: the listener system the circuit breaker and retry policy
//!   report through
//! - [`error`]: [`ResilienceError`], the error every guarded datastore call
//!   returns to its caller

pub mod error;
pub mod events;

pub use error::ResilienceError;
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
