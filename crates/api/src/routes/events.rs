//! Route definitions for the event bus.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::events;
use crate::state::AppState;

/// Event routes mounted at `/events`.
///
/// ```text
/// GET  /            -> list_events
/// POST /            -> publish_event
/// GET  /stats       -> get_stats
/// GET  /types       -> list_event_types
/// GET  /modules     -> list_module_subscriptions
/// POST /purge       -> purge_events
/// GET  /{id}        -> get_event
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(events::list_events).post(events::publish_event))
        .route("/stats", get(events::get_stats))
        .route("/types", get(events::list_event_types))
        .route("/modules", get(events::list_module_subscriptions))
        .route("/purge", post(events::purge_events))
        .route("/{id}", get(events::get_event))
}
