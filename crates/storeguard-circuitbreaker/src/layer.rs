use crate::{CircuitBreaker, CircuitBreakerError};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A tower [`Layer`] that puts a [`CircuitBreaker`] in front of a service.
///
/// Every service produced by the layer shares the breaker it was created from.
///
/// ```rust
/// use storeguard_circuitbreaker::CircuitBreakerConfig;
/// use tower::{service_fn, ServiceBuilder};
///
/// let breaker = CircuitBreakerConfig::datastore().build();
/// let service = ServiceBuilder::new()
///     .layer(breaker.layer())
///     .service(service_fn(|sql: String| async move {
///         Ok::<_, std::io::Error>(sql.len())
///     }));
/// # let _ = service;
/// ```
#[derive(Clone, Debug)]
pub struct CircuitBreakerLayer {
    breaker: CircuitBreaker,
}

impl CircuitBreakerLayer {
    pub(crate) fn new(breaker: CircuitBreaker) -> Self {
        Self { breaker }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreakerService {
            inner,
            breaker: self.breaker.clone(),
        }
    }
}

/// Service produced by [`CircuitBreakerLayer`].
#[derive(Clone, Debug)]
pub struct CircuitBreakerService<S> {
    inner: S,
    breaker: CircuitBreaker,
}

impl<S> CircuitBreakerService<S> {
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, Req> Service<Req> for CircuitBreakerService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // Take the service that was driven to readiness and leave a clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let breaker = self.breaker.clone();

        Box::pin(async move { breaker.execute(move || inner.call(req)).await })
    }
}
