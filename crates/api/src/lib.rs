//! HTTP boundary for the event bus.
//!
//! Exposes config, state, error handling and routes so integration tests
//! and the binary entrypoint can both build the same application.

pub mod config;
pub mod error;
pub mod handlers;
pub mod query;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;
