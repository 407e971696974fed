//! Outcome events and the listeners that observe them.
//!
//! The circuit breaker and the retry policy never log or count anything
//! themselves beyond their optional `tracing`/`metrics` features; everything
//! else (alerting, test probes, custom dashboards) hangs off these listeners.
//!
//! Listeners are invoked synchronously, in registration order, on the task
//! that produced the event. A panicking listener is isolated: the panic is
//! swallowed and the remaining listeners still run, so observers can never
//! change the outcome of the guarded call.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::time::Instant;

/// An event emitted by one of the resilience components.
pub trait ResilienceEvent: fmt::Debug + Send + Sync {
    /// Short, stable identifier of the event kind (`"state_transition"`, `"retry"`, ...).
    fn kind(&self) -> &'static str;

    /// Name of the breaker or retry policy that emitted the event.
    fn source(&self) -> &str;

    /// When the event happened.
    fn occurred_at(&self) -> Instant;
}

/// Receives events of type `E`.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

/// Adapter turning a closure into an [`EventListener`].
pub struct FnListener<F> {
    f: F,
}

impl<F> FnListener<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<E, F> EventListener<E> for FnListener<F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

impl<F> fmt::Debug for FnListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnListener(<closure>)")
    }
}

/// An ordered set of listeners for one event type.
///
/// Cloning is cheap: listeners are shared behind `Arc`s.
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Registers a closure as a listener.
    pub fn subscribe<F>(&mut self, f: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.add(FnListener::new(f));
    }

    /// Delivers `event` to every listener.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let _ = catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}
