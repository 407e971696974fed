use thiserror::Error;

/// Errors returned by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute).
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the operation was not run.
    #[error("circuit breaker is open")]
    OpenCircuit,

    /// The circuit is half-open and all probe slots are in use; the operation
    /// was not run.
    #[error("circuit breaker is half-open: too many requests")]
    TooManyProbes,

    /// The operation ran and returned this error.
    #[error(transparent)]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit)
    }

    pub fn is_too_many_probes(&self) -> bool {
        matches!(self, CircuitBreakerError::TooManyProbes)
    }

    /// `true` when the breaker refused the call.
    pub fn is_rejection(&self) -> bool {
        self.is_circuit_open() || self.is_too_many_probes()
    }

    /// Returns the operation's error, if the operation ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}
