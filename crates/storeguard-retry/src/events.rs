use std::time::Duration;
use storeguard_core::ResilienceEvent;
use tokio::time::Instant;

/// Events emitted by a [`RetryPolicy`](crate::RetryPolicy).
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// Attempt `attempt` failed with a retryable error; the next attempt
    /// starts after `delay`.
    Retry {
        policy: String,
        at: Instant,
        attempt: usize,
        delay: Duration,
    },
    /// An attempt succeeded.
    Success {
        policy: String,
        at: Instant,
        attempts: usize,
    },
    /// The attempt or time budget ran out; the last error was returned.
    Exhausted {
        policy: String,
        at: Instant,
        attempts: usize,
        elapsed: Duration,
    },
    /// The retry predicate rejected the error; it was returned immediately.
    Permanent {
        policy: String,
        at: Instant,
        attempts: usize,
    },
}

impl ResilienceEvent for RetryEvent {
    fn kind(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::Permanent { .. } => "permanent",
        }
    }

    fn source(&self) -> &str {
        match self {
            RetryEvent::Retry { policy, .. }
            | RetryEvent::Success { policy, .. }
            | RetryEvent::Exhausted { policy, .. }
            | RetryEvent::Permanent { policy, .. } => policy,
        }
    }

    fn occurred_at(&self) -> Instant {
        match self {
            RetryEvent::Retry { at, .. }
            | RetryEvent::Success { at, .. }
            | RetryEvent::Exhausted { at, .. }
            | RetryEvent::Permanent { at, .. } => *at,
        }
    }
}
