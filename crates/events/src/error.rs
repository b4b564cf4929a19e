//! Errors raised on the persistence and dispatch paths.
//!
//! Neither type ever reaches a publisher: storage failures are logged by the
//! store and callback failures by the dispatcher.

use modular_db::models::event::RowDecodeError;

use crate::handler::HandlerError;

/// Persisting or loading an event failed.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to serialize event payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored event is unreadable: {0}")]
    Decode(#[from] RowDecodeError),
}

/// A subscriber callback did not complete cleanly.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("handler of module '{module}' failed: {source}")]
    Failed {
        module: String,
        #[source]
        source: HandlerError,
    },

    #[error("handler of module '{module}' panicked: {message}")]
    Panicked { module: String, message: String },
}

impl CallbackError {
    /// Build a `Panicked` error from a caught panic payload.
    pub(crate) fn panicked(module: &str, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        CallbackError::Panicked {
            module: module.to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_rendered() {
        let err = CallbackError::panicked("billing", &"boom");
        assert_eq!(
            err.to_string(),
            "handler of module 'billing' panicked: boom"
        );

        let err = CallbackError::panicked("billing", &String::from("owned boom"));
        assert!(err.to_string().ends_with("owned boom"));

        let err = CallbackError::panicked("billing", &42_u8);
        assert!(err.to_string().ends_with("non-string panic payload"));
    }
}
