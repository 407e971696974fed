//! The error returned by every guarded datastore call.
//!
//! A guarded call either fails fast because the circuit breaker refused to
//! admit it, or it ran (possibly several times) and the operation's own error
//! came back. Callers usually only need to tell those two apart:
//!
//! ```rust
//! use storeguard_core::ResilienceError;
//!
//! fn status_for(err: &ResilienceError<std::io::Error>) -> u16 {
//!     if err.is_fail_fast() {
//!         503
//!     } else {
//!         500
//!     }
//! }
//!
//! let open: ResilienceError<std::io::Error> = ResilienceError::CircuitOpen { name: None };
//! assert_eq!(status_for(&open), 503);
//! ```

use thiserror::Error;

/// Outcome of a failed guarded call.
///
/// `E` is the error type of the wrapped operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResilienceError<E> {
    /// The breaker is open; the operation was not attempted.
    #[error("{}", open_message(.name.as_deref()))]
    CircuitOpen { name: Option<String> },

    /// The breaker is half-open and its probe slots are taken; the operation
    /// was not attempted.
    #[error("{}", probes_message(.name.as_deref()))]
    TooManyProbes { name: Option<String> },

    /// The operation ran and failed.
    #[error(transparent)]
    Application(E),
}

fn open_message(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("circuit breaker '{name}' is open"),
        None => "circuit breaker is open".to_string(),
    }
}

fn probes_message(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("circuit breaker '{name}' is half-open: too many requests"),
        None => "circuit breaker is half-open: too many requests".to_string(),
    }
}

impl<E> ResilienceError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    pub fn is_too_many_probes(&self) -> bool {
        matches!(self, ResilienceError::TooManyProbes { .. })
    }

    /// `true` when the breaker rejected the call without running it.
    pub fn is_fail_fast(&self) -> bool {
        self.is_circuit_open() || self.is_too_many_probes()
    }

    pub fn is_application(&self) -> bool {
        matches!(self, ResilienceError::Application(_))
    }

    /// The breaker name carried by a fail-fast rejection.
    pub fn breaker_name(&self) -> Option<&str> {
        match self {
            ResilienceError::CircuitOpen { name } | ResilienceError::TooManyProbes { name } => {
                name.as_deref()
            }
            ResilienceError::Application(_) => None,
        }
    }

    /// Borrows the operation's error, if there is one.
    pub fn as_application(&self) -> Option<&E> {
        match self {
            ResilienceError::Application(e) => Some(e),
            _ => None,
        }
    }

    /// Takes the operation's error, if there is one.
    pub fn application_error(self) -> Option<E> {
        match self {
            ResilienceError::Application(e) => Some(e),
            _ => None,
        }
    }

    /// Converts the operation's error, leaving rejections untouched.
    ///
    /// ```
    /// use storeguard_core::ResilienceError;
    ///
    /// let err: ResilienceError<String> = ResilienceError::Application("boom".into());
    /// let mapped = err.map_application(|s| s.len());
    /// assert_eq!(mapped.application_error(), Some(4));
    /// ```
    pub fn map_application<T, F>(self, f: F) -> ResilienceError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ResilienceError::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            ResilienceError::TooManyProbes { name } => ResilienceError::TooManyProbes { name },
            ResilienceError::Application(e) => ResilienceError::Application(f(e)),
        }
    }
}
