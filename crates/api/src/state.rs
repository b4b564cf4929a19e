use std::sync::Arc;

use modular_events::{EventBus, EventStore};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything inside is behind an `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Read side of the event log.
    pub store: EventStore,
    /// Broker that publishes go through.
    pub bus: Arc<EventBus>,
}
