use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::time::Duration;
use tokio::time::Instant;

/// The state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls run and their outcomes are counted.
    Closed = 0,
    /// Calls are rejected until the open timeout elapses.
    Open = 1,
    /// A limited number of probe calls run to test recovery.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Call counters of the current generation.
///
/// All counters are zeroed whenever the breaker changes state, and while
/// closed each time the clear interval elapses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Calls admitted.
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    /// Share of admitted calls that failed, `0.0` before any call.
    pub fn failure_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            f64::from(self.total_failures) / f64::from(self.requests)
        }
    }

    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub counts: Counts,
    /// Failure ratio of the current generation.
    pub failure_rate: f64,
    /// Number of state changes and clear-interval resets so far.
    pub generation: u64,
    pub time_since_state_change: Duration,
}

/// Outcome of asking the circuit to admit a call.
pub(crate) enum Admission {
    Permitted { generation: u64, state: CircuitState },
    Rejected { state: CircuitState },
}

/// The breaker's mutable bookkeeping. Always accessed under the breaker's
/// mutex; every method takes the current time so callers read the clock once.
pub(crate) struct Circuit {
    state: CircuitState,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
    last_state_change: Instant,
    pending: Vec<CircuitBreakerEvent>,
}

impl Circuit {
    pub(crate) fn new(config: &CircuitBreakerConfig, now: Instant) -> Self {
        let mut circuit = Self {
            state: CircuitState::Closed,
            generation: 0,
            counts: Counts::default(),
            expiry: None,
            last_state_change: now,
            pending: Vec::new(),
        };
        circuit.start_generation(config, now);
        circuit
    }

    /// Current state after applying any expired deadline.
    pub(crate) fn current_state(&mut self, config: &CircuitBreakerConfig, now: Instant) -> CircuitState {
        let expired = self.expiry.is_some_and(|deadline| deadline <= now);
        match self.state {
            CircuitState::Closed if expired => self.start_generation(config, now),
            CircuitState::Open if expired => self.transition_to(CircuitState::HalfOpen, config, now),
            _ => {}
        }
        self.state
    }

    pub(crate) fn counts(&mut self, config: &CircuitBreakerConfig, now: Instant) -> Counts {
        self.current_state(config, now);
        self.counts
    }

    pub(crate) fn metrics(&mut self, config: &CircuitBreakerConfig, now: Instant) -> CircuitMetrics {
        let state = self.current_state(config, now);
        CircuitMetrics {
            state,
            counts: self.counts,
            failure_rate: self.counts.failure_ratio(),
            generation: self.generation,
            time_since_state_change: now.saturating_duration_since(self.last_state_change),
        }
    }

    pub(crate) fn try_acquire(&mut self, config: &CircuitBreakerConfig, now: Instant) -> Admission {
        let state = self.current_state(config, now);
        let admitted = match state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => self.counts.requests < config.max_half_open_probes,
        };

        if !admitted {
            self.pending.push(CircuitBreakerEvent::CallRejected {
                breaker: config.name.clone(),
                at: now,
                state,
            });

            #[cfg(feature = "metrics")]
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected")
                .increment(1);

            return Admission::Rejected { state };
        }

        self.counts.on_request();
        self.pending.push(CircuitBreakerEvent::CallPermitted {
            breaker: config.name.clone(),
            at: now,
            state,
        });
        Admission::Permitted {
            generation: self.generation,
            state,
        }
    }

    /// Takes back the admission of a call that ended without an outcome.
    /// Only used for calls admitted while closed; the request no longer
    /// counts toward the trip policy.
    pub(crate) fn release(&mut self, config: &CircuitBreakerConfig, generation: u64, now: Instant) -> bool {
        let state = self.current_state(config, now);
        if generation != self.generation || state != CircuitState::Closed {
            return false;
        }
        self.counts.requests = self.counts.requests.saturating_sub(1);
        true
    }

    /// Records the outcome of a call admitted in `generation`. Outcomes from
    /// an earlier generation are dropped; returns whether it was counted.
    pub(crate) fn record(
        &mut self,
        config: &CircuitBreakerConfig,
        generation: u64,
        success: bool,
        now: Instant,
    ) -> bool {
        let state = self.current_state(config, now);
        if generation != self.generation {
            return false;
        }

        #[cfg(feature = "metrics")]
        {
            let outcome = if success { "success" } else { "failure" };
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => outcome)
                .increment(1);
        }

        if success {
            self.counts.on_success();
            self.pending.push(CircuitBreakerEvent::SuccessRecorded {
                breaker: config.name.clone(),
                at: now,
                state,
            });
            if state == CircuitState::HalfOpen
                && self.counts.consecutive_successes >= config.max_half_open_probes
            {
                self.transition_to(CircuitState::Closed, config, now);
            }
        } else {
            self.counts.on_failure();
            self.pending.push(CircuitBreakerEvent::FailureRecorded {
                breaker: config.name.clone(),
                at: now,
                state,
            });
            match state {
                CircuitState::Closed if config.trip_policy.should_trip(&self.counts) => {
                    self.transition_to(CircuitState::Open, config, now)
                }
                CircuitState::HalfOpen => self.transition_to(CircuitState::Open, config, now),
                _ => {}
            }
        }
        true
    }

    /// Events produced since the last drain, in order.
    pub(crate) fn drain_events(&mut self) -> Vec<CircuitBreakerEvent> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    fn transition_to(&mut self, to: CircuitState, config: &CircuitBreakerConfig, now: Instant) {
        if self.state == to {
            return;
        }

        let from = self.state;
        self.state = to;
        self.last_state_change = now;
        self.start_generation(config, now);

        self.pending.push(CircuitBreakerEvent::StateTransition {
            breaker: config.name.clone(),
            at: now,
            from,
            to,
        });

        #[cfg(feature = "tracing")]
        tracing::warn!(
            breaker = %config.name,
            from = from.as_str(),
            to = to.as_str(),
            "circuit breaker state changed"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(f64::from(to as u8));
        }
    }

    fn start_generation(&mut self, config: &CircuitBreakerConfig, now: Instant) {
        self.generation = self.generation.wrapping_add(1);
        self.counts = Counts::default();
        self.expiry = match self.state {
            CircuitState::Closed if config.clear_interval.is_zero() => None,
            CircuitState::Closed => Some(now + config.clear_interval),
            CircuitState::Open => Some(now + config.open_timeout),
            CircuitState::HalfOpen => None,
        };
    }
}
