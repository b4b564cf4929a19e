//! Core domain types for the modular framework's event system.
//!
//! Pure data and validation logic with no I/O, shared by the storage,
//! broker and HTTP crates.

pub mod error;
pub mod event;
pub mod event_schema;
pub mod types;
