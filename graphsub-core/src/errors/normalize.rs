//! Raw record normalization errors

use thiserror::Error;

/// Errors raised by the event normalizer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// A required field (id, type tag) is absent from the raw record
    #[error("Malformed mutation record: missing {missing}")]
    Malformed { missing: &'static str },

    /// The event source emitted an operation tag the engine does not know
    #[error("Unrecognized mutation operation tag '{0}'")]
    UnrecognizedOperation(String),

    /// A relationship tag without its relationship section
    #[error("Relationship record '{0}' carries no relationship data")]
    MissingRelationship(String),
}

impl NormalizeError {
    /// Unrecognized tags mean the event source and engine have drifted apart.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NormalizeError::UnrecognizedOperation(_))
    }

    /// Get error code for GraphQL/API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            NormalizeError::UnrecognizedOperation(_) => "CONFIGURATION_ERROR",
            NormalizeError::Malformed { .. } | NormalizeError::MissingRelationship(_) => {
                "MALFORMED_EVENT"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_is_fatal() {
        let err = NormalizeError::UnrecognizedOperation("upsert".to_string());
        assert!(err.is_fatal());
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert_eq!(
            err.to_string(),
            "Unrecognized mutation operation tag 'upsert'"
        );
    }

    #[test]
    fn test_malformed_is_not_fatal() {
        let err = NormalizeError::Malformed { missing: "type tag" };
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Malformed mutation record: missing type tag");
    }
}
