//! Callback types shared by the bus and the subscriber facade.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use modular_core::event::Event;
use serde_json::Value;

/// What a subscriber handler returns.
pub type HandlerResult = Result<(), HandlerError>;

/// A callback registered on the bus. Invoked once per matching event on a
/// worker-pool task.
pub type Callback = Arc<dyn Fn(Arc<Event>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Box an async closure into a [`Callback`].
pub fn callback<F, Fut>(f: F) -> Callback
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// Failure reported by a subscriber handler. Logged, never retried.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The handler looked at the event and refused it.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// How much of an event a subscriber handler receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    #[default]
    FullEvent,
    PayloadOnly,
}

/// The value handed to a subscriber handler.
#[derive(Debug, Clone)]
pub enum Delivery {
    Event(Arc<Event>),
    Payload(Value),
}

impl Delivery {
    pub fn new(event: Arc<Event>, mode: DeliveryMode) -> Self {
        match mode {
            DeliveryMode::FullEvent => Delivery::Event(event),
            DeliveryMode::PayloadOnly => Delivery::Payload(event.data.clone()),
        }
    }

    /// The full event, if this delivery carries one.
    pub fn event(&self) -> Option<&Event> {
        match self {
            Delivery::Event(event) => Some(event),
            Delivery::Payload(_) => None,
        }
    }

    /// The `data` payload, available in both modes.
    pub fn payload(&self) -> &Value {
        match self {
            Delivery::Event(event) => &event.data,
            Delivery::Payload(data) => data,
        }
    }
}
