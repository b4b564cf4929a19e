//! Module-scoped publishing facade.

use std::sync::Arc;

use modular_core::event::{EventPriority, NewEvent};
use modular_core::event_schema::ValidationError;
use serde_json::Value;

use crate::bus::EventBus;

/// Publishes on behalf of one module, stamping its name and version on
/// every event.
#[derive(Clone)]
pub struct EventPublisher {
    bus: Arc<EventBus>,
    module: String,
    version: Option<String>,
}

impl EventPublisher {
    pub fn new(bus: Arc<EventBus>, module: impl Into<String>) -> Self {
        Self {
            bus,
            module: module.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub async fn publish(
        &self,
        event_type: impl Into<String>,
        data: Value,
        priority: EventPriority,
    ) -> Result<String, ValidationError> {
        self.publish_with(NewEvent::new(event_type, self.module.as_str(), data).with_priority(priority))
            .await
    }

    /// Publish a fully built event. Source module and version are always
    /// overwritten with this publisher's identity.
    pub async fn publish_with(&self, mut raw: NewEvent) -> Result<String, ValidationError> {
        raw.source_module = Some(self.module.clone());
        raw.source_version = self.version.clone();
        self.bus.publish(raw).await
    }

    pub async fn publish_low(
        &self,
        event_type: impl Into<String>,
        data: Value,
        correlation_id: Option<String>,
    ) -> Result<String, ValidationError> {
        self.publish_at(event_type, data, EventPriority::Low, correlation_id)
            .await
    }

    pub async fn publish_normal(
        &self,
        event_type: impl Into<String>,
        data: Value,
        correlation_id: Option<String>,
    ) -> Result<String, ValidationError> {
        self.publish_at(event_type, data, EventPriority::Normal, correlation_id)
            .await
    }

    pub async fn publish_high(
        &self,
        event_type: impl Into<String>,
        data: Value,
        correlation_id: Option<String>,
    ) -> Result<String, ValidationError> {
        self.publish_at(event_type, data, EventPriority::High, correlation_id)
            .await
    }

    pub async fn publish_critical(
        &self,
        event_type: impl Into<String>,
        data: Value,
        correlation_id: Option<String>,
    ) -> Result<String, ValidationError> {
        self.publish_at(event_type, data, EventPriority::Critical, correlation_id)
            .await
    }

    async fn publish_at(
        &self,
        event_type: impl Into<String>,
        data: Value,
        priority: EventPriority,
        correlation_id: Option<String>,
    ) -> Result<String, ValidationError> {
        let mut raw = NewEvent::new(event_type, self.module.as_str(), data).with_priority(priority);
        raw.correlation_id = correlation_id;
        self.publish_with(raw).await
    }
}
