//! Circuit breaker guarding calls to a shared dependency.
//!
//! A breaker watches the outcome of every call it admits and, once its trip
//! policy decides the dependency is unhealthy, fails fast instead of running
//! further calls.
//!
//! ## States
//! - **Closed**: calls run; outcomes are counted and checked against the trip
//!   policy after every failure
//! - **Open**: calls are rejected with [`CircuitBreakerError::OpenCircuit`]
//!   until the open timeout elapses
//! - **Half-Open**: up to `max_half_open_probes` calls run; the rest are
//!   rejected with [`CircuitBreakerError::TooManyProbes`]. A probe failure
//!   reopens the circuit, enough probe successes close it
//!
//! Timeouts are applied lazily: an open breaker becomes half-open the next
//! time it is called or inspected after the timeout.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use storeguard_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerError, TripPolicy};
//!
//! # async fn example() {
//! let breaker = CircuitBreakerConfig::builder()
//!     .name("inventory")
//!     .trip_policy(TripPolicy::consecutive_failures(2))
//!     .open_timeout(Duration::from_secs(5))
//!     .build();
//!
//! match breaker.execute(|| async { Ok::<_, std::io::Error>(42) }).await {
//!     Ok(n) => println!("got {n}"),
//!     Err(CircuitBreakerError::OpenCircuit | CircuitBreakerError::TooManyProbes) => {
//!         println!("dependency unavailable")
//!     }
//!     Err(CircuitBreakerError::Inner(e)) => println!("call failed: {e}"),
//! }
//! # }
//! ```
//!
//! ## Generations
//!
//! Every state change (and every clear-interval reset while closed) starts a
//! new generation. An outcome is only counted against the generation the call
//! was admitted in, so a slow call that finishes after the breaker moved on
//! cannot flip the new state.
//!
//! A call whose operation panics is counted as a failure. A call whose future
//! is dropped after admission (the caller gave up) records no outcome, except
//! for a half-open probe, which counts as a failure so its slot is freed.
//!
//! ## Feature Flags
//! - `metrics`: `circuitbreaker_calls_total`, `circuitbreaker_transitions_total`
//!   and the `circuitbreaker_state` gauge
//! - `tracing`: transitions at WARN, admission decisions at DEBUG/TRACE

use crate::circuit::{Admission, Circuit};
#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
#[cfg(feature = "metrics")]
use std::sync::Once;
use tokio::time::Instant;

pub use circuit::{CircuitMetrics, CircuitState, Counts};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder, TripPolicy};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};

mod circuit;
mod config;
mod error;
mod events;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "circuitbreaker_calls_total",
            "Calls seen by the circuit breaker, by outcome"
        );
        describe_counter!(
            "circuitbreaker_transitions_total",
            "Circuit breaker state transitions"
        );
        describe_gauge!(
            "circuitbreaker_state",
            "Current circuit breaker state (0 closed, 1 open, 2 half-open)"
        );
    });
}

struct Shared {
    config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
    state: AtomicU8,
}

/// A circuit breaker. Clones share the same state.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

impl CircuitBreaker {
    /// Creates a closed breaker from a finished configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        describe_metrics();
        let circuit = Circuit::new(&config, Instant::now());
        Self {
            shared: Arc::new(Shared {
                config,
                circuit: Mutex::new(circuit),
                state: AtomicU8::new(CircuitState::Closed as u8),
            }),
        }
    }

    /// Starts a configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfig::builder()
    }

    /// Runs `op` if the breaker admits it and records its outcome.
    ///
    /// `op` is never called when the breaker rejects the call. The operation
    /// runs outside the breaker's lock, so concurrent calls proceed in
    /// parallel.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (generation, admitted_in) = match self.with_circuit(|c, config, now| c.try_acquire(config, now)) {
            Admission::Permitted { generation, state } => (generation, state),
            Admission::Rejected { state } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %self.name(), state = state.as_str(), "circuit breaker rejected call");
                return Err(match state {
                    CircuitState::HalfOpen => CircuitBreakerError::TooManyProbes,
                    _ => CircuitBreakerError::OpenCircuit,
                });
            }
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(breaker = %self.name(), generation, "circuit breaker permitted call");

        let mut guard = InFlight {
            breaker: self,
            generation,
            half_open: admitted_in == CircuitState::HalfOpen,
            settled: false,
        };
        let result = op().await;
        guard.settle(result.is_ok());

        result.map_err(CircuitBreakerError::Inner)
    }

    /// Current state, applying an expired open timeout or clear interval.
    pub fn state(&self) -> CircuitState {
        self.with_circuit(|c, config, now| c.current_state(config, now))
    }

    /// Last state the breaker stored, without taking its lock.
    ///
    /// An open breaker whose timeout already passed still reports `Open` here
    /// until the next call or [`state`](Self::state).
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Counters of the current generation.
    pub fn counts(&self) -> Counts {
        self.with_circuit(|c, config, now| c.counts(config, now))
    }

    pub fn metrics(&self) -> CircuitMetrics {
        self.with_circuit(|c, config, now| c.metrics(config, now))
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.shared.config
    }

    /// Equivalent to `self.state_sync() == CircuitState::Open`.
    pub fn is_open(&self) -> bool {
        self.state_sync() == CircuitState::Open
    }

    /// `"healthy"` when closed, `"degraded"` when half-open, `"unhealthy"`
    /// when open.
    pub fn health_status(&self) -> &'static str {
        match self.state_sync() {
            CircuitState::Closed => "healthy",
            CircuitState::HalfOpen => "degraded",
            CircuitState::Open => "unhealthy",
        }
    }

    /// A tower layer routing every request of the wrapped service through
    /// this breaker.
    pub fn layer(&self) -> CircuitBreakerLayer {
        CircuitBreakerLayer::new(self.clone())
    }

    fn record(&self, generation: u64, success: bool) {
        let counted = self.with_circuit(|c, config, now| c.record(config, generation, success, now));

        if !counted {
            #[cfg(feature = "tracing")]
            tracing::trace!(breaker = %self.name(), generation, "discarded outcome from an earlier generation");
        }
    }

    fn release(&self, generation: u64) {
        let released = self.with_circuit(|c, config, now| c.release(config, generation, now));

        #[cfg(feature = "tracing")]
        tracing::trace!(breaker = %self.name(), generation, released, "call abandoned before completing");
        #[cfg(not(feature = "tracing"))]
        let _ = released;
    }

    /// Runs `f` under the lock, publishes the resulting state, and emits the
    /// queued events once the lock is released.
    fn with_circuit<R>(&self, f: impl FnOnce(&mut Circuit, &CircuitBreakerConfig, Instant) -> R) -> R {
        let shared = &*self.shared;
        let (result, events) = {
            let mut circuit = shared.circuit.lock().unwrap_or_else(PoisonError::into_inner);
            let result = f(&mut circuit, &shared.config, Instant::now());
            shared.state.store(circuit.state() as u8, Ordering::Release);
            (result, circuit.drain_events())
        };

        for event in &events {
            shared.config.event_listeners.emit(event);
        }
        result
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name())
            .field("state", &self.state_sync())
            .finish()
    }
}

/// Settles an admitted call that never produced an outcome.
///
/// A panicking operation and an abandoned half-open probe count as failures,
/// so a probe slot is never leaked. Any other abandoned call (the caller
/// dropped the future) is released without an outcome.
struct InFlight<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    half_open: bool,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(&mut self, success: bool) {
        self.settled = true;
        self.breaker.record(self.generation, success);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if self.half_open || std::thread::panicking() {
            self.breaker.record(self.generation, false);
        } else {
            self.breaker.release(self.generation);
        }
    }
}
