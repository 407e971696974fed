use crate::backoff::{ExponentialBackoff, ExponentialRandomBackoff, IntervalFunction};
use crate::events::RetryEvent;
use crate::RetryPolicy;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use storeguard_core::EventListeners;

/// Decides whether an error is worth another attempt.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Told about every failure that will be retried, with the delay before the
/// next attempt.
pub type NotifyFn<E> = Arc<dyn Fn(&E, Duration) + Send + Sync>;

/// Builds the error for an attempt that outlived the remaining time budget,
/// given how long the attempt ran.
pub type TimeoutFn<E> = Arc<dyn Fn(Duration) -> E + Send + Sync>;

/// Immutable settings of a [`RetryPolicy`].
pub struct RetryConfig<E> {
    pub(crate) name: String,
    pub(crate) interval: Arc<dyn IntervalFunction>,
    pub(crate) max_elapsed_time: Option<Duration>,
    pub(crate) max_attempts: Option<usize>,
    pub(crate) retry_predicate: Option<RetryPredicate<E>>,
    pub(crate) notify: Option<NotifyFn<E>>,
    pub(crate) timeout_error: Option<TimeoutFn<E>>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
}

impl<E> RetryConfig<E> {
    pub fn builder() -> RetryConfigBuilder<E> {
        crate::describe_metrics();
        RetryConfigBuilder::new()
    }

    /// Budget for one datastore operation made on behalf of a request:
    /// 100ms first delay, doubling up to 2s, no jitter, and no new attempt
    /// once 5s would be exceeded.
    pub fn request_path() -> RetryConfigBuilder<E> {
        Self::builder()
            .name("request")
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(2))
            .multiplier(2.0)
            .randomization_factor(0.0)
            .max_elapsed_time(Duration::from_secs(5))
    }

    /// Budget for establishing connections at startup: 500ms first delay
    /// growing by 1.5 up to 60s with ±50% jitter, for at most two minutes.
    pub fn startup() -> RetryConfigBuilder<E> {
        Self::builder()
            .name("startup")
            .initial_delay(Duration::from_millis(500))
            .max_delay(Duration::from_secs(60))
            .multiplier(1.5)
            .randomization_factor(0.5)
            .max_elapsed_time(Duration::from_secs(120))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_elapsed_time(&self) -> Option<Duration> {
        self.max_elapsed_time
    }

    pub fn max_attempts(&self) -> Option<usize> {
        self.max_attempts
    }

    /// Delay the policy would wait after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: usize) -> Duration {
        self.interval.next_interval(attempt.saturating_sub(1))
    }

    /// When attempts are capped: the end of the time budget for a run that
    /// began at `started`, and the error to fail a late attempt with.
    pub(crate) fn attempt_deadline(
        &self,
        started: tokio::time::Instant,
    ) -> Option<(tokio::time::Instant, &TimeoutFn<E>)> {
        match (&self.timeout_error, self.max_elapsed_time) {
            (Some(timed_out), Some(budget)) => Some((started + budget, timed_out)),
            _ => None,
        }
    }

    pub(crate) fn is_retryable(&self, error: &E) -> bool {
        self.retry_predicate.as_ref().is_none_or(|p| p(error))
    }
}

impl<E> fmt::Debug for RetryConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("name", &self.name)
            .field("max_elapsed_time", &self.max_elapsed_time)
            .field("max_attempts", &self.max_attempts)
            .field("has_predicate", &self.retry_predicate.is_some())
            .field("caps_attempts", &self.timeout_error.is_some())
            .field("listeners", &self.event_listeners.len())
            .finish()
    }
}

/// Builder for [`RetryPolicy`].
///
/// Unless [`backoff`](Self::backoff) supplies a custom interval function, the
/// delays are exponential: `initial_delay × multiplier^(n-1)` capped at
/// `max_delay`, jittered by `randomization_factor`.
pub struct RetryConfigBuilder<E> {
    name: String,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    randomization_factor: f64,
    interval: Option<Arc<dyn IntervalFunction>>,
    max_elapsed_time: Option<Duration>,
    max_attempts: Option<usize>,
    retry_predicate: Option<RetryPredicate<E>>,
    notify: Option<NotifyFn<E>>,
    timeout_error: Option<TimeoutFn<E>>,
    event_listeners: EventListeners<RetryEvent>,
}

impl<E> RetryConfigBuilder<E> {
    fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            randomization_factor: 0.0,
            interval: None,
            max_elapsed_time: Some(Duration::from_secs(5)),
            max_attempts: None,
            retry_predicate: None,
            notify: None,
            timeout_error: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Name used in events, logs and metric labels.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Delay after the first failure.
    ///
    /// Default: 100ms
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Default: 2s
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Default: 2.0
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Each delay is drawn from `delay × [1 - factor, 1 + factor]`.
    ///
    /// Default: 0.0
    pub fn randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor;
        self
    }

    /// Replaces the exponential delays with a custom interval function.
    pub fn backoff<I>(mut self, interval: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval = Some(Arc::new(interval));
        self
    }

    /// No attempt is started whose delay would take the total time spent past
    /// this budget.
    ///
    /// Default: 5s
    pub fn max_elapsed_time(mut self, budget: Duration) -> Self {
        self.max_elapsed_time = Some(budget);
        self
    }

    /// Removes the time budget; pair with [`max_attempts`](Self::max_attempts).
    pub fn unbounded_elapsed_time(mut self) -> Self {
        self.max_elapsed_time = None;
        self
    }

    /// Total attempts, including the first.
    ///
    /// Default: unlimited
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Only errors for which `predicate` is true are retried; the rest are
    /// returned at once.
    ///
    /// Default: every error is retried
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    /// Called with the error and the upcoming delay before every wait.
    ///
    /// ```rust
    /// use storeguard_retry::RetryConfig;
    ///
    /// let policy = RetryConfig::<std::io::Error>::request_path()
    ///     .notify(|err, delay| eprintln!("query failed ({err}), retrying in {delay:?}"))
    ///     .build();
    /// # let _ = policy;
    /// ```
    pub fn notify<F>(mut self, f: F) -> Self
    where
        F: Fn(&E, Duration) + Send + Sync + 'static,
    {
        self.notify = Some(Arc::new(f));
        self
    }

    /// Cuts every attempt off when the time budget runs out, failing it with
    /// the error `f` builds from how long the attempt ran.
    ///
    /// Without this an attempt that hangs holds the caller past
    /// [`max_elapsed_time`](Self::max_elapsed_time). The timeout error goes
    /// through the retry predicate like any other.
    pub fn timeout_error<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) -> E + Send + Sync + 'static,
    {
        self.timeout_error = Some(Arc::new(f));
        self
    }

    /// Called with the failed attempt number (1-based) and the delay.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.subscribe(move |event: &RetryEvent| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        });
        self
    }

    /// Called with the number of attempts it took.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.subscribe(move |event: &RetryEvent| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        });
        self
    }

    /// Called with the attempts made and the time spent when the budget runs out.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.subscribe(move |event: &RetryEvent| {
            if let RetryEvent::Exhausted {
                attempts, elapsed, ..
            } = event
            {
                f(*attempts, *elapsed);
            }
        });
        self
    }

    /// Called when the retry predicate rejects an error.
    pub fn on_permanent<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.subscribe(move |event: &RetryEvent| {
            if let RetryEvent::Permanent { attempts, .. } = event {
                f(*attempts);
            }
        });
        self
    }

    pub fn into_config(self) -> RetryConfig<E> {
        let interval = self.interval.unwrap_or_else(|| {
            if self.randomization_factor > 0.0 {
                Arc::new(
                    ExponentialRandomBackoff::new(self.initial_delay, self.randomization_factor)
                        .multiplier(self.multiplier)
                        .max_interval(self.max_delay),
                )
            } else {
                Arc::new(
                    ExponentialBackoff::new(self.initial_delay)
                        .multiplier(self.multiplier)
                        .max_interval(self.max_delay),
                )
            }
        });

        RetryConfig {
            name: self.name,
            interval,
            max_elapsed_time: self.max_elapsed_time,
            max_attempts: self.max_attempts,
            retry_predicate: self.retry_predicate,
            notify: self.notify,
            timeout_error: self.timeout_error,
            event_listeners: self.event_listeners,
        }
    }

    pub fn build(self) -> RetryPolicy<E> {
        RetryPolicy::new(self.into_config())
    }
}
