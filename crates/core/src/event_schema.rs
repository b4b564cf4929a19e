//! Event validation and normalization.
//!
//! [`validate_and_normalize`] turns a [`NewEvent`] into an [`Event`] or a
//! [`ValidationError`] listing every offending field. Defaults are filled
//! in on success: a UUID v4 `id`, the current time as `timestamp` and
//! [`EventPriority::Normal`].

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::event::{
    is_valid_event_type, Event, EventPriority, NewEvent, CUSTOM_EVENT_PREFIX, SYSTEM_EVENT_TYPES,
};

const MISSING_FIELD: &str = "Missing data for required field.";
const EMPTY_FIELD: &str = "Field may not be empty.";

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// Field-level validation failures, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("Invalid event: {}", format_messages(&self.messages))]
#[serde(transparent)]
pub struct ValidationError {
    messages: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.messages
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// All messages, grouped by field.
    pub fn messages(&self) -> &BTreeMap<String, Vec<String>> {
        &self.messages
    }

    /// Whether `field` has at least one message.
    pub fn has_field(&self, field: &str) -> bool {
        self.messages.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn format_messages(messages: &BTreeMap<String, Vec<String>>) -> String {
    messages
        .iter()
        .map(|(field, msgs)| format!("{field}: {}", msgs.join(" ")))
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a raw event and fill in defaults.
///
/// Required: `event_type`, `source_module`, `data` (a JSON object).
/// `event_type` must be a system type or start with `CUSTOM_`; `priority`,
/// when given, must name an [`EventPriority`]. Pure: no side effects.
pub fn validate_and_normalize(raw: NewEvent) -> Result<Event, ValidationError> {
    let mut errors = ValidationError::default();

    let id = optional_non_empty(&mut errors, "id", raw.id);
    let source_module = required_string(&mut errors, "source_module", raw.source_module);

    let event_type = required_string(&mut errors, "event_type", raw.event_type);
    if let Some(ref t) = event_type {
        if !is_valid_event_type(t) {
            errors.push(
                "event_type",
                format!(
                    "Invalid event type. Must be one of {SYSTEM_EVENT_TYPES:?} or start with '{CUSTOM_EVENT_PREFIX}'"
                ),
            );
        }
    }

    let priority = match raw.priority.as_deref() {
        None => Some(EventPriority::Normal),
        Some(p) => match p.parse::<EventPriority>() {
            Ok(p) => Some(p),
            Err(_) => {
                errors.push("priority", "Must be one of: low, normal, high, critical.");
                None
            }
        },
    };

    let data = match raw.data {
        None | Some(Value::Null) => {
            errors.push("data", MISSING_FIELD);
            None
        }
        Some(v @ Value::Object(_)) => Some(v),
        Some(_) => {
            errors.push("data", "Not a valid mapping type.");
            None
        }
    };

    match (event_type, source_module, priority, data) {
        (Some(event_type), Some(source_module), Some(priority), Some(data))
            if errors.is_empty() =>
        {
            Ok(Event {
                id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                event_type,
                timestamp: raw.timestamp.unwrap_or_else(Utc::now),
                source_module,
                source_version: raw.source_version,
                priority,
                correlation_id: raw.correlation_id,
                causation_id: raw.causation_id,
                idempotency_key: raw.idempotency_key,
                data,
                processed: false,
            })
        }
        _ => Err(errors),
    }
}

fn required_string(
    errors: &mut ValidationError,
    field: &str,
    value: Option<String>,
) -> Option<String> {
    match value {
        None => {
            errors.push(field, MISSING_FIELD);
            None
        }
        Some(s) if s.trim().is_empty() => {
            errors.push(field, EMPTY_FIELD);
            None
        }
        Some(s) => Some(s),
    }
}

fn optional_non_empty(
    errors: &mut ValidationError,
    field: &str,
    value: Option<String>,
) -> Option<String> {
    match value {
        Some(s) if s.trim().is_empty() => {
            errors.push(field, EMPTY_FIELD);
            None
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
