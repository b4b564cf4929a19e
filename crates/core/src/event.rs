//! Event envelope, priorities and the recognised event type vocabulary.
//!
//! [`NewEvent`] is what producers hand to the bus: every field optional,
//! nothing checked yet. [`Event`] is the validated, normalized form that is
//! queued, persisted and delivered. The conversion between the two lives in
//! [`crate::event_schema`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{EventId, Timestamp};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Prefix reserved for producer-defined event types, e.g. `CUSTOM_INVOICE_PAID`.
pub const CUSTOM_EVENT_PREFIX: &str = "CUSTOM_";

/// Event types known to the platform.
pub const SYSTEM_EVENT_TYPES: &[&str] = &[
    // Users
    "USER_CREATED",
    "USER_UPDATED",
    "USER_DELETED",
    "USER_LOGIN",
    "USER_LOGOUT",
    // Modules
    "MODULE_REGISTERED",
    "MODULE_UPDATED",
    "MODULE_ACTIVATED",
    "MODULE_DEACTIVATED",
    // Roles and permissions
    "ROLE_CREATED",
    "ROLE_UPDATED",
    "ROLE_DELETED",
    "PERMISSION_GRANTED",
    "PERMISSION_REVOKED",
    // System
    "SYSTEM_STARTUP",
    "SYSTEM_SHUTDOWN",
    "SYSTEM_ERROR",
    // Generic data changes
    "DATA_CREATED",
    "DATA_UPDATED",
    "DATA_DELETED",
    // Catch-all for module specific events
    "CUSTOM",
];

/// Whether `event_type` is one of [`SYSTEM_EVENT_TYPES`].
pub fn is_system_event_type(event_type: &str) -> bool {
    SYSTEM_EVENT_TYPES.contains(&event_type)
}

/// Whether `event_type` may be published: a system type or a `CUSTOM_` type.
pub fn is_valid_event_type(event_type: &str) -> bool {
    is_system_event_type(event_type) || event_type.starts_with(CUSTOM_EVENT_PREFIX)
}

// ---------------------------------------------------------------------------
// EventPriority
// ---------------------------------------------------------------------------

/// Informational priority carried with every event.
///
/// The broker never reorders by priority; it is stored and reported only.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EventPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl EventPriority {
    pub const ALL: [EventPriority; 4] = [
        EventPriority::Low,
        EventPriority::Normal,
        EventPriority::High,
        EventPriority::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventPriority::Low => "low",
            EventPriority::Normal => "normal",
            EventPriority::High => "high",
            EventPriority::Critical => "critical",
        }
    }
}

impl fmt::Display for EventPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a priority.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority '{0}', expected one of low, normal, high, critical")]
pub struct UnknownPriority(pub String);

impl FromStr for EventPriority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventPriority::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPriority(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A validated event. Immutable once queued, apart from `processed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: String,
    pub timestamp: Timestamp,
    pub source_module: String,
    pub source_version: Option<String>,
    pub priority: EventPriority,
    pub correlation_id: Option<String>,
    pub causation_id: Option<String>,
    pub idempotency_key: Option<String>,
    /// Free-form JSON object; see [`EventData`] for the recognised keys.
    pub data: Value,
    /// Dispatch was attempted. Says nothing about subscriber success.
    #[serde(default)]
    pub processed: bool,
}

impl Event {
    /// Key the dispatcher deduplicates on: the idempotency key when the
    /// producer supplied one, otherwise the event id.
    pub fn dedup_key(&self) -> &str {
        self.idempotency_key.as_deref().unwrap_or(&self.id)
    }

    pub fn is_custom(&self) -> bool {
        !is_system_event_type(&self.event_type)
    }
}

// ---------------------------------------------------------------------------
// NewEvent
// ---------------------------------------------------------------------------

/// Raw, unvalidated event as supplied by a producer or decoded from JSON.
///
/// Built with [`NewEvent::new`] and the `with_*` methods, or deserialized
/// directly. Inputs accept `type` for `event_type` and `event_id` for `id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEvent {
    #[serde(default, alias = "event_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "type")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub source_module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl NewEvent {
    /// Start an event with the three required fields.
    pub fn new(
        event_type: impl Into<String>,
        source_module: impl Into<String>,
        data: impl Into<Value>,
    ) -> Self {
        Self {
            event_type: Some(event_type.into()),
            source_module: Some(source_module.into()),
            data: Some(data.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = Some(priority.as_str().to_string());
        self
    }

    pub fn with_source_version(mut self, version: impl Into<String>) -> Self {
        self.source_version = Some(version.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_causation_id(mut self, causation_id: impl Into<String>) -> Self {
        self.causation_id = Some(causation_id.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

// ---------------------------------------------------------------------------
// EventData
// ---------------------------------------------------------------------------

/// Typed builder for the conventional payload keys.
///
/// None of these keys are required; the bus only insists that `data` is a
/// JSON object. Converts into a [`Value`] for [`NewEvent::new`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<Value>,
}

impl EventData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identify the entity the event is about.
    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_previous_state(mut self, state: Value) -> Self {
        self.previous_state = Some(state);
        self
    }

    pub fn with_current_state(mut self, state: Value) -> Self {
        self.current_state = Some(state);
        self
    }

    pub fn with_changes(mut self, changes: Value) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_custom_data(mut self, custom: Value) -> Self {
        self.custom_data = Some(custom);
        self
    }
}

impl From<EventData> for Value {
    fn from(data: EventData) -> Self {
        let mut map = serde_json::Map::new();
        let fields = [
            ("entity_id", data.entity_id.map(Value::String)),
            ("entity_type", data.entity_type.map(Value::String)),
            ("previous_state", data.previous_state),
            ("current_state", data.current_state),
            ("changes", data.changes),
            ("metadata", data.metadata),
            ("custom_data", data.custom_data),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                map.insert(key.to_string(), value);
            }
        }
        Value::Object(map)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn custom_prefix_is_accepted_but_bare_unknown_types_are_not() {
        assert!(is_valid_event_type("USER_CREATED"));
        assert!(is_valid_event_type("CUSTOM"));
        assert!(is_valid_event_type("CUSTOM_INVOICE_PAID"));
        assert!(!is_valid_event_type("INVOICE_PAID"));
        assert!(!is_valid_event_type("custom_invoice_paid"));
    }

    #[test]
    fn priority_parses_and_orders() {
        assert_eq!("high".parse::<EventPriority>(), Ok(EventPriority::High));
        assert!("urgent".parse::<EventPriority>().is_err());
        assert!(EventPriority::Low < EventPriority::Normal);
        assert!(EventPriority::High < EventPriority::Critical);
        assert_eq!(EventPriority::default(), EventPriority::Normal);
    }

    #[test]
    fn priority_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(EventPriority::Critical).unwrap(),
            json!("critical")
        );
    }

    #[test]
    fn new_event_accepts_type_alias_from_json() {
        let raw: NewEvent = serde_json::from_value(json!({
            "type": "USER_CREATED",
            "source_module": "auth",
            "data": {"entity_id": "u1"}
        }))
        .unwrap();
        assert_eq!(raw.event_type.as_deref(), Some("USER_CREATED"));
        assert_eq!(raw.source_module.as_deref(), Some("auth"));
        assert!(raw.id.is_none());
    }

    #[test]
    fn event_data_skips_absent_keys() {
        let value: Value = EventData::new()
            .entity("user", "u1")
            .with_changes(json!({"email": "new@example.com"}))
            .into();
        assert_eq!(
            value,
            json!({
                "entity_id": "u1",
                "entity_type": "user",
                "changes": {"email": "new@example.com"}
            })
        );
    }

    #[test]
    fn dedup_key_prefers_idempotency_key() {
        let mut event = Event {
            id: "e1".into(),
            event_type: "DATA_CREATED".into(),
            timestamp: chrono::Utc::now(),
            source_module: "inventory".into(),
            source_version: None,
            priority: EventPriority::Normal,
            correlation_id: None,
            causation_id: None,
            idempotency_key: None,
            data: json!({}),
            processed: false,
        };
        assert_eq!(event.dedup_key(), "e1");
        event.idempotency_key = Some("order-42".into());
        assert_eq!(event.dedup_key(), "order-42");
    }
}
