//! Module-scoped subscription facade.
//!
//! [`EventSubscriber`] wraps each handler in an adapter that applies the
//! optional filter and shapes the [`Delivery`] according to the requested
//! [`DeliveryMode`] before the handler sees the event.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use modular_core::event::Event;

use crate::bus::{EventBus, SubscriptionHandle};
use crate::handler::{callback, Delivery, DeliveryMode, HandlerResult};

/// Predicate deciding whether a handler sees an event.
pub type Filter = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

pub struct EventSubscriber {
    bus: Arc<EventBus>,
    module: String,
    handles: Mutex<Vec<SubscriptionHandle>>,
}

impl EventSubscriber {
    pub fn new(bus: Arc<EventBus>, module: impl Into<String>) -> Self {
        Self {
            bus,
            module: module.into(),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Run `handler` for every event of `event_type`.
    pub fn subscribe<H, Fut>(
        &self,
        event_type: impl Into<String>,
        mode: DeliveryMode,
        handler: H,
    ) -> SubscriptionHandle
    where
        H: Fn(Delivery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(event_type.into(), mode, None, handler)
    }

    /// Like [`subscribe`](Self::subscribe), but only events for which
    /// `filter` returns `true` reach the handler. A panicking filter skips
    /// the event.
    pub fn subscribe_filtered<P, H, Fut>(
        &self,
        event_type: impl Into<String>,
        mode: DeliveryMode,
        filter: P,
        handler: H,
    ) -> SubscriptionHandle
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
        H: Fn(Delivery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let filter: Filter = Arc::new(filter);
        self.register(event_type.into(), mode, Some(filter), handler)
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.handles().retain(|h| h != handle);
        self.bus.unsubscribe(handle)
    }

    /// Drop every handler this subscriber registered for `event_type`.
    pub fn unsubscribe_type(&self, event_type: &str) -> usize {
        let removed: Vec<SubscriptionHandle> = {
            let mut handles = self.handles();
            let (matching, rest): (Vec<_>, Vec<_>) = handles
                .drain(..)
                .partition(|h| h.event_type == event_type);
            *handles = rest;
            matching
        };

        removed.iter().filter(|h| self.bus.unsubscribe(h)).count()
    }

    /// Drop every registration made through this subscriber. Registrations
    /// made under the same module name elsewhere are left alone; use
    /// [`EventBus::unsubscribe_module`] to clear a whole module.
    pub fn unsubscribe_all(&self) -> usize {
        let removed: Vec<SubscriptionHandle> = self.handles().drain(..).collect();
        removed.iter().filter(|h| self.bus.unsubscribe(h)).count()
    }

    /// Event types the module is currently subscribed to.
    pub fn subscribed_events(&self) -> Vec<String> {
        self.bus.module_subscriptions(&self.module)
    }

    fn register<H, Fut>(
        &self,
        event_type: String,
        mode: DeliveryMode,
        filter: Option<Filter>,
        handler: H,
    ) -> SubscriptionHandle
    where
        H: Fn(Delivery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let module = self.module.clone();

        let adapter = callback(move |event: Arc<Event>| {
            let handler = Arc::clone(&handler);
            let filter = filter.clone();
            let module = module.clone();
            async move {
                if let Some(filter) = filter {
                    if !passes(filter.as_ref(), &event, &module) {
                        return Ok(());
                    }
                }
                handler(Delivery::new(event, mode)).await
            }
        });

        let handle = self.bus.subscribe(event_type, self.module.as_str(), adapter);
        self.handles().push(handle.clone());
        handle
    }

    fn handles(&self) -> std::sync::MutexGuard<'_, Vec<SubscriptionHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn passes(filter: &(dyn Fn(&Event) -> bool + Send + Sync), event: &Event, module: &str) -> bool {
    match std::panic::catch_unwind(AssertUnwindSafe(|| filter(event))) {
        Ok(pass) => pass,
        Err(_) => {
            tracing::warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                module = %module,
                "Event filter panicked, skipping handler"
            );
            false
        }
    }
}
