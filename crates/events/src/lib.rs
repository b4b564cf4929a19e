//! In-process event bus for the modular framework.
//!
//! - [`EventBus`] validates, persists and asynchronously fans events out
//!   to subscriber callbacks on a bounded worker pool.
//! - [`EventStore`] keeps a best-effort durable record of every published event.
//! - [`EventPublisher`] / [`EventSubscriber`] are module-scoped facades
//!   that producers and consumers hold instead of touching the bus directly.
//! - [`BusConfig`] holds the tuning knobs loaded from the environment.

pub mod bus;
pub mod config;
pub mod error;
pub mod handler;
pub mod idempotency;
pub mod publisher;
pub mod store;
pub mod subscriber;

pub use bus::{BusMetrics, EventBus, SubscriptionHandle};
pub use config::{BusConfig, ConfigError};
pub use error::{CallbackError, StorageError};
pub use handler::{callback, Callback, Delivery, DeliveryMode, HandlerError, HandlerResult};
pub use idempotency::IdempotencyGuard;
pub use publisher::EventPublisher;
pub use store::EventStore;
pub use subscriber::{EventSubscriber, Filter};
