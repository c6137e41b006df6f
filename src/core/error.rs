//! Error types for the chunk engine

use std::sync::Arc;
use thiserror::Error;

/// Main error type for the engine
///
/// Cloneable so a single settled error can be handed to every waiter of an
/// [`AsyncResult`](crate::promise::AsyncResult).
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Panicked: {0}")]
    Panicked(String),

    #[error("Result was already settled")]
    AlreadySettled,

    /// Returned from a `then` mapping to drop the derived result silently.
    #[error("Ignored")]
    Ignored,

    #[error("Result was abandoned before being settled")]
    Abandoned,

    #[error("Timed out waiting for result")]
    Timeout,

    #[error("Invalid chunk layout: {0}")]
    InvalidLayout(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl Error {
    /// Build an error from a caught panic payload
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Error::Panicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_is_cloneable() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        let copy = err.clone();
        assert!(matches!(copy, Error::Io(_)));
        assert!(copy.to_string().contains("missing"));
    }

    #[test]
    fn test_from_panic_payload() {
        let caught = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        match Error::from_panic(caught) {
            Error::Panicked(msg) => assert_eq!(msg, "boom"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
