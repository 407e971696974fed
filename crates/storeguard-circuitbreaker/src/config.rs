use crate::circuit::{CircuitState, Counts};
use crate::events::CircuitBreakerEvent;
use crate::CircuitBreaker;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use storeguard_core::EventListeners;

const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONSECUTIVE_FAILURES: u32 = 6;

type TripFn = dyn Fn(&Counts) -> bool + Send + Sync;

/// Decides, after each failure in the closed state, whether the breaker trips.
#[derive(Clone)]
pub struct TripPolicy {
    predicate: Arc<TripFn>,
    description: String,
}

impl TripPolicy {
    /// Trips once at least `min_requests` calls were made in the current
    /// generation and the share of failures reached `ratio`.
    pub fn failure_ratio(min_requests: u32, ratio: f64) -> Self {
        Self {
            predicate: Arc::new(move |counts: &Counts| {
                counts.requests >= min_requests && counts.failure_ratio() >= ratio
            }),
            description: format!("failure_ratio(min_requests={min_requests}, ratio={ratio})"),
        }
    }

    /// Trips once `n` calls in a row have failed.
    pub fn consecutive_failures(n: u32) -> Self {
        Self {
            predicate: Arc::new(move |counts: &Counts| counts.consecutive_failures >= n),
            description: format!("consecutive_failures({n})"),
        }
    }

    /// Trips when `f` returns `true` for the counts right after a failure.
    ///
    /// `f` is not called after successes, so a predicate that already holds
    /// waits for the next failure before the breaker opens.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Counts) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(f),
            description: "custom".to_string(),
        }
    }

    pub fn should_trip(&self, counts: &Counts) -> bool {
        (self.predicate)(counts)
    }
}

impl Default for TripPolicy {
    /// More than five consecutive failures.
    fn default() -> Self {
        Self::consecutive_failures(DEFAULT_CONSECUTIVE_FAILURES)
    }
}

impl fmt::Debug for TripPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Immutable settings of one circuit breaker.
pub struct CircuitBreakerConfig {
    pub(crate) name: String,
    pub(crate) max_half_open_probes: u32,
    pub(crate) clear_interval: Duration,
    pub(crate) open_timeout: Duration,
    pub(crate) trip_policy: TripPolicy,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        crate::describe_metrics();
        CircuitBreakerConfigBuilder::new()
    }

    /// The settings used in front of the record store: one probe, no clear
    /// interval, a 30 second cooldown, and a trip once at least three calls
    /// were made with 60% or more of them failing.
    ///
    /// Returns the builder so listeners can still be attached.
    pub fn datastore() -> CircuitBreakerConfigBuilder {
        Self::builder()
            .name("DatabaseCB")
            .max_half_open_probes(1)
            .clear_interval(Duration::ZERO)
            .open_timeout(Duration::from_secs(30))
            .trip_policy(TripPolicy::failure_ratio(3, 0.6))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_half_open_probes(&self) -> u32 {
        self.max_half_open_probes
    }

    pub fn clear_interval(&self) -> Duration {
        self.clear_interval
    }

    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }

    pub fn trip_policy(&self) -> &TripPolicy {
        &self.trip_policy
    }
}

impl fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("name", &self.name)
            .field("max_half_open_probes", &self.max_half_open_probes)
            .field("clear_interval", &self.clear_interval)
            .field("open_timeout", &self.open_timeout)
            .field("trip_policy", &self.trip_policy)
            .field("listeners", &self.event_listeners.len())
            .finish()
    }
}

/// Builder for a [`CircuitBreaker`].
pub struct CircuitBreakerConfigBuilder {
    name: String,
    max_half_open_probes: u32,
    clear_interval: Duration,
    open_timeout: Duration,
    trip_policy: TripPolicy,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfigBuilder {
    fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            max_half_open_probes: 1,
            clear_interval: Duration::ZERO,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            trip_policy: TripPolicy::default(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Name reported in errors, events, logs and metric labels.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Number of calls admitted while half-open, and the number of
    /// consecutive probe successes needed to close again. Zero means one.
    ///
    /// Default: 1
    pub fn max_half_open_probes(mut self, n: u32) -> Self {
        self.max_half_open_probes = n.max(1);
        self
    }

    /// How often the counts are cleared while closed. Zero never clears them.
    ///
    /// Default: zero
    pub fn clear_interval(mut self, interval: Duration) -> Self {
        self.clear_interval = interval;
        self
    }

    /// How long the breaker stays open before admitting a probe. Zero keeps
    /// the default.
    ///
    /// Default: 60 seconds
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = if timeout.is_zero() {
            DEFAULT_OPEN_TIMEOUT
        } else {
            timeout
        };
        self
    }

    /// Default: trips after more than five consecutive failures.
    pub fn trip_policy(mut self, policy: TripPolicy) -> Self {
        self.trip_policy = policy;
        self
    }

    /// Shorthand for `trip_policy(TripPolicy::custom(f))`.
    pub fn trip_when<F>(self, f: F) -> Self
    where
        F: Fn(&Counts) -> bool + Send + Sync + 'static,
    {
        self.trip_policy(TripPolicy::custom(f))
    }

    /// Called with `(from, to)` on every state change.
    ///
    /// ```rust
    /// use storeguard_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let breaker = CircuitBreakerConfig::builder()
    ///     .name("orders")
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("orders breaker tripped (was {from:?})");
    ///         }
    ///     })
    ///     .build();
    /// assert_eq!(breaker.name(), "orders");
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.subscribe(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::StateTransition { from, to, .. } = event {
                f(*from, *to);
            }
        });
        self
    }

    /// Called with the current state whenever a call is admitted.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.subscribe(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                f(*state);
            }
        });
        self
    }

    /// Called with the refusing state whenever a call is rejected.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.subscribe(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::CallRejected { state, .. } = event {
                f(*state);
            }
        });
        self
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.subscribe(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                f(*state);
            }
        });
        self
    }

    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.subscribe(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::FailureRecorded { state, .. } = event {
                f(*state);
            }
        });
        self
    }

    /// Registers a listener for every breaker event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.event_listeners.subscribe(f);
        self
    }

    /// Finishes the configuration without building a breaker.
    pub fn into_config(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            name: self.name,
            max_half_open_probes: self.max_half_open_probes,
            clear_interval: self.clear_interval,
            open_timeout: self.open_timeout,
            trip_policy: self.trip_policy,
            event_listeners: self.event_listeners,
        }
    }

    /// Builds the breaker. It starts closed.
    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::new(self.into_config())
    }
}
