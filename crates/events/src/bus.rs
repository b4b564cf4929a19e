//! The event broker.
//!
//! [`EventBus`] validates incoming events, records them in the
//! [`EventStore`], and queues them for a single background dispatcher. The
//! dispatcher drops duplicates, then hands every subscriber callback for the
//! event's type to a bounded worker pool and marks the event processed.
//!
//! "Processed" means dispatch was attempted: it is set once callbacks have
//! been submitted, before any of them run, and says nothing about whether
//! they succeeded. Callback failures and panics are logged and counted,
//! never retried.
//!
//! The bus is shared as `Arc<EventBus>`. Dropping the last handle stops it.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures::FutureExt;
use modular_core::event::{Event, EventPriority, NewEvent};
use modular_core::event_schema::{validate_and_normalize, ValidationError};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::BusConfig;
use crate::error::CallbackError;
use crate::handler::Callback;
use crate::idempotency::IdempotencyGuard;
use crate::store::EventStore;

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// Identifies one registration returned by [`EventBus::subscribe`].
///
/// Pass it back to [`EventBus::unsubscribe`] to remove exactly that
/// callback. Registering the same callback twice yields two handles and two
/// invocations per event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub id: u64,
    pub event_type: String,
    pub module: String,
}

struct Subscription {
    id: u64,
    module: String,
    callback: Callback,
}

/// Callbacks keyed by event type. A type is present only while it has at
/// least one subscription.
#[derive(Default)]
struct Registry {
    by_type: BTreeMap<String, Vec<Subscription>>,
}

impl Registry {
    fn types_for_module(&self, module: &str) -> Vec<String> {
        self.by_type
            .iter()
            .filter(|(_, subs)| subs.iter().any(|s| s.module == module))
            .map(|(event_type, _)| event_type.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    dispatched: AtomicU64,
    duplicates_skipped: AtomicU64,
    callbacks_submitted: AtomicU64,
    callback_failures: AtomicU64,
}

/// Point-in-time snapshot of the bus counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusMetrics {
    /// Events accepted by `publish`.
    pub published: u64,
    /// Events the dispatcher fanned out (including those with no subscribers).
    pub dispatched: u64,
    pub duplicates_skipped: u64,
    pub callbacks_submitted: u64,
    /// Callbacks that returned an error or panicked.
    pub callback_failures: u64,
}

// ---------------------------------------------------------------------------
// Shared dispatcher state
// ---------------------------------------------------------------------------

struct Shared {
    registry: RwLock<Registry>,
    guard: Mutex<IdempotencyGuard>,
    store: Option<EventStore>,
    workers: Arc<Semaphore>,
    counters: Arc<Counters>,
}

impl Shared {
    async fn dispatch(&self, event: Arc<Event>) {
        let fresh = self
            .guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .check_and_insert(event.dedup_key());

        if !fresh {
            self.counters.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                dedup_key = %event.dedup_key(),
                "Duplicate event skipped"
            );
            // A replay under a new id has its own row; skipping it still
            // counts as dispatch attempted.
            if let Some(store) = &self.store {
                store.mark_processed(&event.id).await;
            }
            return;
        }

        let targets: Vec<(String, Callback)> = {
            let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
            registry
                .by_type
                .get(&event.event_type)
                .map(|subs| {
                    subs.iter()
                        .map(|s| (s.module.clone(), Arc::clone(&s.callback)))
                        .collect()
                })
                .unwrap_or_default()
        };

        if targets.is_empty() {
            tracing::debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                "No subscribers for event"
            );
        } else {
            tracing::debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                subscribers = targets.len(),
                "Dispatching event"
            );
            for (module, callback) in targets {
                self.submit(Arc::clone(&event), module, callback);
            }
        }

        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);

        if let Some(store) = &self.store {
            store.mark_processed(&event.id).await;
        }
    }

    /// Run one callback on the worker pool. Returns immediately.
    fn submit(&self, event: Arc<Event>, module: String, callback: Callback) {
        let workers = Arc::clone(&self.workers);
        let counters = Arc::clone(&self.counters);
        counters.callbacks_submitted.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            // The pool is never closed, so callbacks queued before `stop`
            // still run once a worker frees up.
            let Ok(_permit) = workers.acquire_owned().await else {
                return;
            };

            let invocation = AssertUnwindSafe({
                let event = Arc::clone(&event);
                async move { callback(event).await }
            })
            .catch_unwind()
            .await;

            let failure = match invocation {
                Ok(Ok(())) => None,
                Ok(Err(source)) => Some(CallbackError::Failed {
                    module: module.clone(),
                    source,
                }),
                Err(payload) => Some(CallbackError::panicked(&module, payload.as_ref())),
            };

            if let Some(e) = failure {
                counters.callback_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    error = %e,
                    event_id = %event.id,
                    event_type = %event.event_type,
                    module = %module,
                    "Event callback failed"
                );
            }
        });
    }
}

/// Dispatcher loop. Pulls events in FIFO order until cancelled.
async fn run_dispatcher(
    shared: Arc<Shared>,
    mut receiver: mpsc::UnboundedReceiver<Arc<Event>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Event dispatcher cancelled");
                break;
            }
            next = receiver.recv() => match next {
                Some(event) => shared.dispatch(event).await,
                None => {
                    tracing::info!("Event queue closed, dispatcher shutting down");
                    break;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

pub struct EventBus {
    shared: Arc<Shared>,
    sender: mpsc::UnboundedSender<Arc<Event>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Arc<Event>>>>,
    cancel: CancellationToken,
    started: AtomicBool,
    next_subscription_id: AtomicU64,
}

impl EventBus {
    /// A bus that keeps nothing on disk.
    pub fn new(config: BusConfig) -> Self {
        Self::build(config, None)
    }

    /// A bus that records every published event in `store`, unless
    /// persistence is disabled in `config`.
    pub fn with_store(config: BusConfig, store: EventStore) -> Self {
        let store = config.persistence_enabled.then_some(store);
        Self::build(config, store)
    }

    fn build(config: BusConfig, store: Option<EventStore>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Shared {
            registry: RwLock::new(Registry::default()),
            guard: Mutex::new(IdempotencyGuard::new(
                config.idempotency_window,
                config.idempotency_capacity,
            )),
            store,
            workers: Arc::new(Semaphore::new(config.max_workers.max(1))),
            counters: Arc::new(Counters::default()),
        };

        Self {
            shared: Arc::new(shared),
            sender,
            receiver: Mutex::new(Some(receiver)),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            next_subscription_id: AtomicU64::new(1),
        }
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Spawn the dispatcher. Returns `true` the first time only; a stopped
    /// bus cannot be restarted.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        if self.cancel.is_cancelled() {
            tracing::warn!("Event bus already stopped, ignoring start");
            return false;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(receiver) = receiver else {
            return false;
        };

        tokio::spawn(run_dispatcher(
            Arc::clone(&self.shared),
            receiver,
            self.cancel.clone(),
        ));
        tracing::info!("Event bus started");
        true
    }

    /// Stop dispatching. Callbacks already submitted to the worker pool
    /// still run but are not awaited. Events queued but not yet dispatched
    /// stay unprocessed.
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        tracing::info!("Event bus stopped");
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    // -- Subscriptions ------------------------------------------------------

    /// Register `callback` for `event_type` on behalf of `module`.
    pub fn subscribe(
        &self,
        event_type: impl Into<String>,
        module: impl Into<String>,
        callback: Callback,
    ) -> SubscriptionHandle {
        let handle = SubscriptionHandle {
            id: self.next_subscription_id.fetch_add(1, Ordering::Relaxed),
            event_type: event_type.into(),
            module: module.into(),
        };

        self.registry_mut()
            .by_type
            .entry(handle.event_type.clone())
            .or_default()
            .push(Subscription {
                id: handle.id,
                module: handle.module.clone(),
                callback,
            });

        tracing::info!(
            event_type = %handle.event_type,
            module = %handle.module,
            subscription_id = handle.id,
            "Subscribed to event"
        );
        handle
    }

    /// Remove one registration. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut registry = self.registry_mut();
        let Some(subs) = registry.by_type.get_mut(&handle.event_type) else {
            return false;
        };

        let before = subs.len();
        subs.retain(|s| s.id != handle.id);
        let removed = subs.len() < before;
        if subs.is_empty() {
            registry.by_type.remove(&handle.event_type);
        }
        drop(registry);

        if removed {
            tracing::info!(
                event_type = %handle.event_type,
                module = %handle.module,
                subscription_id = handle.id,
                "Unsubscribed from event"
            );
        }
        removed
    }

    /// Remove every registration made by `module`. Returns how many went.
    pub fn unsubscribe_module(&self, module: &str) -> usize {
        let mut registry = self.registry_mut();
        let mut removed = 0;
        registry.by_type.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|s| s.module != module);
            removed += before - subs.len();
            !subs.is_empty()
        });
        drop(registry);

        tracing::info!(module = %module, removed, "Unsubscribed module from all events");
        removed
    }

    /// Event types with at least one subscriber, sorted.
    pub fn event_types(&self) -> Vec<String> {
        self.registry().by_type.keys().cloned().collect()
    }

    /// Event types `module` is subscribed to, sorted.
    pub fn module_subscriptions(&self, module: &str) -> Vec<String> {
        self.registry().types_for_module(module)
    }

    /// Every module with at least one subscription, mapped to its types.
    pub fn all_module_subscriptions(&self) -> BTreeMap<String, Vec<String>> {
        let registry = self.registry();
        let mut modules: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (event_type, subs) in &registry.by_type {
            for sub in subs {
                let types = modules.entry(sub.module.clone()).or_default();
                if types.last() != Some(event_type) {
                    types.push(event_type.clone());
                }
            }
        }
        modules
    }

    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.registry()
            .by_type
            .get(event_type)
            .map_or(0, Vec::len)
    }

    // -- Publishing ---------------------------------------------------------

    /// Validate, record and queue an event. Returns its id.
    ///
    /// Persistence is best-effort: a failed write is logged and the event is
    /// still queued. Nothing waits for dispatch. On a stopped bus the event
    /// is recorded but never dispatched.
    pub async fn publish(&self, raw: NewEvent) -> Result<String, ValidationError> {
        let event = validate_and_normalize(raw)?;
        self.shared.counters.published.fetch_add(1, Ordering::Relaxed);

        if let Some(store) = &self.shared.store {
            if let Err(e) = store.append(&event).await {
                tracing::error!(
                    error = %e,
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "Failed to persist event"
                );
            }
        }

        let id = event.id.clone();
        let event_type = event.event_type.clone();
        let source_module = event.source_module.clone();

        if self.cancel.is_cancelled() {
            tracing::warn!(
                event_id = %id,
                event_type = %event_type,
                "Event published to a stopped bus, it will not be dispatched"
            );
            return Ok(id);
        }

        if self.sender.send(Arc::new(event)).is_err() {
            tracing::warn!(event_id = %id, "Event queue closed, event not dispatched");
            return Ok(id);
        }

        tracing::info!(
            event_id = %id,
            event_type = %event_type,
            source_module = %source_module,
            "Event published"
        );
        Ok(id)
    }

    /// Convenience wrapper over [`publish`](Self::publish) for the common
    /// fields.
    pub async fn publish_event(
        &self,
        event_type: impl Into<String>,
        source_module: impl Into<String>,
        data: Value,
        priority: EventPriority,
        correlation_id: Option<String>,
    ) -> Result<String, ValidationError> {
        let mut raw = NewEvent::new(event_type, source_module, data).with_priority(priority);
        raw.correlation_id = correlation_id;
        self.publish(raw).await
    }

    // -- Introspection ------------------------------------------------------

    pub fn metrics(&self) -> BusMetrics {
        let c = &self.shared.counters;
        BusMetrics {
            published: c.published.load(Ordering::Relaxed),
            dispatched: c.dispatched.load(Ordering::Relaxed),
            duplicates_skipped: c.duplicates_skipped.load(Ordering::Relaxed),
            callbacks_submitted: c.callbacks_submitted.load(Ordering::Relaxed),
            callback_failures: c.callback_failures.load(Ordering::Relaxed),
        }
    }

    pub fn store(&self) -> Option<&EventStore> {
        self.shared.store.as_ref()
    }

    fn registry(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.shared
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.shared
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
