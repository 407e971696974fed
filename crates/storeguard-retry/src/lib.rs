//! Exponential-backoff retry for fallible async operations.
//!
//! A [`RetryPolicy`] runs an operation, and while it keeps failing with a
//! retryable error, waits and runs it again. It stops when the operation
//! succeeds, when the error is permanent, when the attempt cap is reached,
//! or when the next wait would push the total time spent past the elapsed
//! time budget. The most recent error is returned unchanged.
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//! use storeguard_retry::RetryConfig;
//!
//! # async fn example() {
//! let policy = RetryConfig::<&'static str>::builder()
//!     .name("ping")
//!     .initial_delay(Duration::from_millis(10))
//!     .max_attempts(3)
//!     .on_retry(|attempt, delay| println!("attempt {attempt} failed, waiting {delay:?}"))
//!     .build();
//!
//! let calls = AtomicUsize::new(0);
//! let result = policy
//!     .run(|| async {
//!         if calls.fetch_add(1, Ordering::SeqCst) < 2 {
//!             Err("not yet")
//!         } else {
//!             Ok("pong")
//!         }
//!     })
//!     .await;
//! assert_eq!(result, Ok("pong"));
//! # }
//! ```
//!
//! # Profiles
//!
//! - [`RetryConfig::request_path`]: a few quick attempts within 5 seconds, for
//!   work done while a client waits
//! - [`RetryConfig::startup`]: a patient, jittered schedule of up to two
//!   minutes, for establishing connections
//!
//! # Feature Flags
//! - `metrics`: `retry_calls_total{retry,outcome}` and `retry_attempts_total{retry}`
//! - `tracing`: every retried failure is logged at WARN

mod backoff;
mod config;
mod events;

pub use backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
};
pub use config::{NotifyFn, RetryConfig, RetryConfigBuilder, RetryPredicate, TimeoutFn};
pub use events::RetryEvent;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use tokio::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "retry_calls_total",
            "Operations run through a retry policy, by final outcome"
        );
        describe_counter!(
            "retry_attempts_total",
            "Retries performed after a failed attempt"
        );
    });
}

/// A retry policy. Clones share the same configuration.
pub struct RetryPolicy<E> {
    config: Arc<RetryConfig<E>>,
}

impl<E> RetryPolicy<E> {
    pub fn new(config: RetryConfig<E>) -> Self {
        describe_metrics();
        Self {
            config: Arc::new(config),
        }
    }

    pub fn builder() -> RetryConfigBuilder<E> {
        RetryConfig::builder()
    }

    pub fn config(&self) -> &RetryConfig<E> {
        &self.config
    }

    /// Runs `op` until it succeeds or the policy gives up.
    ///
    /// The first attempt starts immediately. Dropping the returned future
    /// abandons any pending wait and attempt. With a
    /// [`timeout_error`](RetryConfigBuilder::timeout_error) configured, an
    /// attempt still running when the time budget ends is dropped and fails
    /// with that error.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let config = &*self.config;
        let started = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let outcome = match config.attempt_deadline(started) {
                Some((deadline, timed_out)) => {
                    let attempt_started = Instant::now();
                    tokio::time::timeout_at(deadline, op())
                        .await
                        .unwrap_or_else(|_| Err(timed_out(attempt_started.elapsed())))
                }
                None => op().await,
            };
            let error = match outcome {
                Ok(value) => {
                    self.finish("success");
                    config.event_listeners.emit(&RetryEvent::Success {
                        policy: config.name.clone(),
                        at: Instant::now(),
                        attempts: attempt,
                    });
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !config.is_retryable(&error) {
                #[cfg(feature = "tracing")]
                tracing::debug!(retry = %config.name, attempt, error = %error, "error is not retryable");
                self.finish("permanent");
                config.event_listeners.emit(&RetryEvent::Permanent {
                    policy: config.name.clone(),
                    at: Instant::now(),
                    attempts: attempt,
                });
                return Err(error);
            }

            let delay = config.delay_after(attempt);
            let elapsed = started.elapsed();
            let out_of_attempts = config.max_attempts.is_some_and(|max| attempt >= max);
            let out_of_time = config
                .max_elapsed_time
                .is_some_and(|budget| elapsed.saturating_add(delay) > budget);

            if out_of_attempts || out_of_time {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    retry = %config.name,
                    attempts = attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %error,
                    "giving up after retries"
                );
                self.finish("exhausted");
                config.event_listeners.emit(&RetryEvent::Exhausted {
                    policy: config.name.clone(),
                    at: Instant::now(),
                    attempts: attempt,
                    elapsed,
                });
                return Err(error);
            }

            #[cfg(feature = "tracing")]
            tracing::warn!(
                retry = %config.name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "operation failed, retrying"
            );
            #[cfg(feature = "metrics")]
            counter!("retry_attempts_total", "retry" => config.name.clone()).increment(1);

            if let Some(notify) = &config.notify {
                notify(&error, delay);
            }
            config.event_listeners.emit(&RetryEvent::Retry {
                policy: config.name.clone(),
                at: Instant::now(),
                attempt,
                delay,
            });
            drop(error);

            tokio::time::sleep(delay).await;
        }
    }

    fn finish(&self, _outcome: &'static str) {
        #[cfg(feature = "metrics")]
        counter!("retry_calls_total", "retry" => self.config.name.clone(), "outcome" => _outcome)
            .increment(1);
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RetryPolicy").field(&self.config).finish()
    }
}
