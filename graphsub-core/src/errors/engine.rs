//! Engine façade errors

use thiserror::Error;

use super::{NormalizeError, SchemaError, SubscribeError};

/// Errors surfaced by [`crate::engine::SubscriptionEngine`]
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Subscribe(#[from] SubscribeError),

    /// The dispatch loop has stopped
    #[error("Subscription engine is shut down")]
    ShutDown,
}

impl EngineError {
    /// Configuration errors are not recoverable per event
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::Schema(_) => true,
            EngineError::Normalize(err) => err.is_fatal(),
            EngineError::Subscribe(_) | EngineError::ShutDown => false,
        }
    }

    /// Get error code for GraphQL/API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::Schema(err) => err.error_code(),
            EngineError::Normalize(err) => err.error_code(),
            EngineError::Subscribe(err) => err.error_code(),
            EngineError::ShutDown => "SERVICE_UNAVAILABLE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let err: EngineError = NormalizeError::UnrecognizedOperation("merge".to_string()).into();
        assert!(err.is_fatal());

        let err: EngineError = NormalizeError::Malformed { missing: "id" }.into();
        assert!(!err.is_fatal());

        let err: EngineError = SubscribeError::UnknownType("X".to_string()).into();
        assert!(!err.is_fatal());
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
