use std::fmt;
use std::future::Future;
use std::time::Duration;
use storeguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use storeguard_core::ResilienceError;
use storeguard_retry::{RetryConfig, RetryPolicy};

/// Errors a guarded datastore call can end with.
///
/// [`ResilientExecutor::for_datastore`] retries only the transient ones and
/// cuts off any attempt that outlives the retry budget.
pub trait DatastoreFault: Sized + Send + Sync + 'static {
    /// Whether a later attempt may succeed.
    fn is_transient(&self) -> bool;

    /// The error for an attempt abandoned after running for `after`.
    fn timed_out(after: Duration) -> Self;
}

/// Runs operations through a retry policy nested inside a circuit breaker.
///
/// The breaker sees the whole retried sequence as one call: however many
/// attempts the retry policy makes, the breaker records exactly one success
/// or one failure. When the breaker refuses the call, the operation is never
/// run and the retry policy never starts.
pub struct ResilientExecutor<E> {
    breaker: CircuitBreaker,
    retry: RetryPolicy<E>,
}

impl<E> ResilientExecutor<E> {
    pub fn new(breaker: CircuitBreaker, retry: RetryPolicy<E>) -> Self {
        Self { breaker, retry }
    }

    /// The `DatabaseCB` breaker preset around the request-path retry profile.
    ///
    /// Only [transient](DatastoreFault::is_transient) errors are retried, and
    /// an attempt still running when the 5s budget ends fails with
    /// [`DatastoreFault::timed_out`].
    pub fn for_datastore() -> Self
    where
        E: DatastoreFault,
    {
        Self::new(
            CircuitBreakerConfig::datastore().build(),
            RetryConfig::request_path()
                .name("DatabaseRetry")
                .retry_on(E::is_transient)
                .timeout_error(E::timed_out)
                .build(),
        )
    }

    /// Runs `op` under the retry policy, as a single call admitted by the
    /// breaker.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let retry = &self.retry;
        self.breaker
            .execute(|| retry.run(op))
            .await
            .map_err(|err| self.classify(err))
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn retry(&self) -> &RetryPolicy<E> {
        &self.retry
    }

    fn classify(&self, err: CircuitBreakerError<E>) -> ResilienceError<E> {
        let name = || Some(self.breaker.name().to_string());
        match err {
            CircuitBreakerError::OpenCircuit => {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %self.breaker.name(), "failing fast: circuit open");
                ResilienceError::CircuitOpen { name: name() }
            }
            CircuitBreakerError::TooManyProbes => {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %self.breaker.name(), "failing fast: probe slots taken");
                ResilienceError::TooManyProbes { name: name() }
            }
            CircuitBreakerError::Inner(e) => ResilienceError::Application(e),
        }
    }
}

impl<E> Clone for ResilientExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<E> fmt::Debug for ResilientExecutor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientExecutor")
            .field("breaker", &self.breaker)
            .field("retry", &self.retry)
            .finish()
    }
}
