//! Handlers for the event bus endpoints.
//!
//! Every handler forwards to the [`EventStore`](modular_events::EventStore)
//! or the [`EventBus`](modular_events::EventBus) and wraps the result in a
//! [`DataResponse`].

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use modular_core::error::CoreError;
use modular_core::event::{Event, NewEvent};
use modular_db::models::event::{EventQuery, EventStats, PurgeCriteria};
use modular_db::repositories::event_repo::{clamp_limit, clamp_offset};
use modular_events::BusMetrics;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::query::{parse_optional_timestamp, split_list};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / query parameter types
// ---------------------------------------------------------------------------

/// Query parameters for listing events.
#[derive(Debug, Default, Deserialize)]
pub struct EventListParams {
    /// Comma-separated event types, OR-ed.
    pub event_type: Option<String>,
    pub source_module: Option<String>,
    pub correlation_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub processed: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query parameters for module subscription lookup.
#[derive(Debug, Deserialize)]
pub struct ModuleParams {
    pub module: Option<String>,
}

/// Body of `POST /events/purge`.
#[derive(Debug, Default, Deserialize)]
pub struct PurgeRequest {
    pub older_than: Option<String>,
    pub event_types: Option<Vec<String>>,
    pub processed_only: Option<bool>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct EventPage {
    pub events: Vec<Event>,
    /// Events in this page.
    pub count: usize,
    /// Events matching the filter across all pages.
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct PublishedEvent {
    pub event_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub store: EventStats,
    pub bus: BusMetrics,
}

#[derive(Debug, Serialize)]
pub struct ModuleSubscriptions {
    pub module: String,
    pub event_types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PurgeResult {
    pub purged_count: u64,
}

// ---------------------------------------------------------------------------
// Listing and lookup
// ---------------------------------------------------------------------------

/// GET /events
///
/// Filtered, paginated listing, newest first.
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<EventListParams>,
) -> AppResult<impl IntoResponse> {
    let query = EventQuery {
        event_types: split_list(params.event_type.as_deref()),
        source_module: params.source_module,
        correlation_id: params.correlation_id,
        start_time: parse_optional_timestamp("start_time", params.start_time.as_deref())?,
        end_time: parse_optional_timestamp("end_time", params.end_time.as_deref())?,
        processed: params.processed,
        limit: params.limit,
        offset: params.offset,
    };

    let events = state.store.query(&query).await;
    let total = state.store.count(&query).await;

    Ok(Json(DataResponse {
        data: EventPage {
            count: events.len(),
            events,
            total,
            limit: clamp_limit(query.limit),
            offset: clamp_offset(query.offset),
        },
    }))
}

/// GET /events/{id}
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let event = state
        .store
        .get(&id)
        .await
        .ok_or(CoreError::NotFound { entity: "Event", id })?;

    Ok(Json(DataResponse { data: event }))
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

/// POST /events
///
/// Validate and publish an event. Returns 201 with the assigned id.
pub async fn publish_event(
    State(state): State<AppState>,
    Json(body): Json<NewEvent>,
) -> AppResult<impl IntoResponse> {
    let event_id = state.bus.publish(body).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: PublishedEvent { event_id },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Introspection
// ---------------------------------------------------------------------------

/// GET /events/stats
pub async fn get_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let store = state.store.stats().await;

    Ok(Json(DataResponse {
        data: StatsResponse {
            store,
            bus: state.bus.metrics(),
        },
    }))
}

/// GET /events/types
///
/// Event types that currently have at least one subscriber.
pub async fn list_event_types(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: state.bus.event_types(),
    }))
}

/// GET /events/modules?module=
///
/// One module's subscriptions, or every module's when `module` is absent.
pub async fn list_module_subscriptions(
    State(state): State<AppState>,
    Query(params): Query<ModuleParams>,
) -> AppResult<axum::response::Response> {
    match params.module {
        Some(module) => {
            let event_types = state.bus.module_subscriptions(&module);
            Ok(Json(DataResponse {
                data: ModuleSubscriptions {
                    module,
                    event_types,
                },
            })
            .into_response())
        }
        None => {
            let modules: BTreeMap<String, Vec<String>> = state.bus.all_module_subscriptions();
            Ok(Json(DataResponse { data: modules }).into_response())
        }
    }
}

// ---------------------------------------------------------------------------
// Retention
// ---------------------------------------------------------------------------

/// POST /events/purge
///
/// Delete stored events. Only processed events are eligible unless
/// `processed_only` is explicitly `false`.
pub async fn purge_events(
    State(state): State<AppState>,
    Json(body): Json<PurgeRequest>,
) -> AppResult<impl IntoResponse> {
    let criteria = PurgeCriteria {
        older_than: parse_optional_timestamp("older_than", body.older_than.as_deref())?,
        event_types: body.event_types.unwrap_or_default(),
        processed_only: body.processed_only.unwrap_or(true),
    };

    let purged_count = state.store.purge(&criteria).await;

    Ok(Json(DataResponse {
        data: PurgeResult { purged_count },
    }))
}
