pub mod events;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /events                  list (GET), publish (POST)
/// /events/stats            store aggregates and bus counters
/// /events/types            event types with subscribers
/// /events/modules          module subscriptions (?module=)
/// /events/purge            retention purge (POST)
/// /events/{id}             single event
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/events", events::router())
}
