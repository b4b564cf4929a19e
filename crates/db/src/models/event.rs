//! Row model and query DTOs for the `events` table.

use std::collections::BTreeMap;

use modular_core::event::{Event, EventPriority, UnknownPriority};
use modular_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// A row from the `events` table. `data` holds the payload as JSON text.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: String,
    pub event_type: String,
    pub timestamp: Timestamp,
    pub source_module: String,
    pub source_version: Option<String>,
    pub priority: String,
    pub correlation_id: Option<String>,
    pub causation_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub data: String,
    pub processed: bool,
}

/// A stored row that no longer decodes into an [`Event`].
#[derive(Debug, thiserror::Error)]
pub enum RowDecodeError {
    #[error("invalid priority column: {0}")]
    Priority(#[from] UnknownPriority),

    #[error("invalid data column: {0}")]
    Data(#[from] serde_json::Error),
}

impl EventRow {
    /// Serialize an event into its row form.
    pub fn from_event(event: &Event) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: event.id.clone(),
            event_type: event.event_type.clone(),
            timestamp: event.timestamp,
            source_module: event.source_module.clone(),
            source_version: event.source_version.clone(),
            priority: event.priority.as_str().to_string(),
            correlation_id: event.correlation_id.clone(),
            causation_id: event.causation_id.clone(),
            idempotency_key: event.idempotency_key.clone(),
            data: serde_json::to_string(&event.data)?,
            processed: event.processed,
        })
    }

    pub fn into_event(self) -> Result<Event, RowDecodeError> {
        let priority: EventPriority = self.priority.parse()?;
        let data = serde_json::from_str(&self.data)?;
        Ok(Event {
            id: self.id,
            event_type: self.event_type,
            timestamp: self.timestamp,
            source_module: self.source_module,
            source_version: self.source_version,
            priority,
            correlation_id: self.correlation_id,
            causation_id: self.causation_id,
            idempotency_key: self.idempotency_key,
            data,
            processed: self.processed,
        })
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Filter parameters for listing events.
///
/// Empty `event_types` means "any type"; several types are OR-ed. Time
/// bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub event_types: Vec<String>,
    pub source_module: Option<String>,
    pub correlation_id: Option<String>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub processed: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Criteria for deleting events.
///
/// `older_than` is exclusive. With `processed_only` (the default) events
/// that have not been dispatched yet are never deleted.
#[derive(Debug, Clone)]
pub struct PurgeCriteria {
    pub older_than: Option<Timestamp>,
    pub event_types: Vec<String>,
    pub processed_only: bool,
}

impl Default for PurgeCriteria {
    fn default() -> Self {
        Self {
            older_than: None,
            event_types: Vec::new(),
            processed_only: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Aggregate counts over the whole table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventStats {
    pub total_events: i64,
    pub events_by_type: BTreeMap<String, i64>,
    pub processed_events: i64,
    pub unprocessed_events: i64,
    pub events_by_priority: BTreeMap<String, i64>,
}
