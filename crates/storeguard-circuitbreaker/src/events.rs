use crate::circuit::CircuitState;
use storeguard_core::ResilienceEvent;
use tokio::time::Instant;

/// Events emitted by a [`CircuitBreaker`](crate::CircuitBreaker).
///
/// Events are delivered after the breaker's internal lock has been released,
/// so listeners may inspect the breaker they observe.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The breaker moved from one state to another.
    StateTransition {
        breaker: String,
        at: Instant,
        from: CircuitState,
        to: CircuitState,
    },
    /// A call was admitted.
    CallPermitted {
        breaker: String,
        at: Instant,
        state: CircuitState,
    },
    /// A call was refused without running. `state` is `Open` for an open
    /// circuit and `HalfOpen` when every probe slot was taken.
    CallRejected {
        breaker: String,
        at: Instant,
        state: CircuitState,
    },
    /// An admitted call succeeded and was counted.
    SuccessRecorded {
        breaker: String,
        at: Instant,
        state: CircuitState,
    },
    /// An admitted call failed (or was an abandoned probe) and was counted.
    FailureRecorded {
        breaker: String,
        at: Instant,
        state: CircuitState,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn kind(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn source(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { breaker, .. }
            | CircuitBreakerEvent::CallPermitted { breaker, .. }
            | CircuitBreakerEvent::CallRejected { breaker, .. }
            | CircuitBreakerEvent::SuccessRecorded { breaker, .. }
            | CircuitBreakerEvent::FailureRecorded { breaker, .. } => breaker,
        }
    }

    fn occurred_at(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { at, .. }
            | CircuitBreakerEvent::CallPermitted { at, .. }
            | CircuitBreakerEvent::CallRejected { at, .. }
            | CircuitBreakerEvent::SuccessRecorded { at, .. }
            | CircuitBreakerEvent::FailureRecorded { at, .. } => *at,
        }
    }
}
