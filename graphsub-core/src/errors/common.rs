//! Common error utilities and GraphQL conversion
//!
//! Subscribe-time errors travel back to the client through the GraphQL
//! error channel, so they carry a structured `code` extension.
//!
//! # Examples
//!
//! ```rust
//! # #[cfg(feature = "graphql")]
//! # {
//! use graphsub::errors::{SubscribeError, ToGraphQLError};
//!
//! let err = SubscribeError::UnknownType("Spaceship".to_string());
//! let graphql_err = err.to_graphql_error();
//! assert_eq!(graphql_err.message, "Type 'Spaceship' cannot be subscribed to");
//! # }
//! ```

#[cfg(feature = "graphql")]
use async_graphql::{Error as GraphQLError, ErrorExtensions};

#[cfg(feature = "graphql")]
use super::*;

/// Convert domain errors to GraphQL errors with error codes
#[cfg(feature = "graphql")]
pub trait ToGraphQLError {
    /// Convert to GraphQL error with structured extensions
    fn to_graphql_error(&self) -> GraphQLError;
}

#[cfg(feature = "graphql")]
impl ToGraphQLError for SubscribeError {
    fn to_graphql_error(&self) -> GraphQLError {
        let code = self.error_code();
        let message = self.to_string();

        GraphQLError::new(message).extend_with(|_, e| {
            e.set("code", code);

            if let Some(field) = self.field() {
                e.set("field", field);
            }

            match self {
                SubscribeError::UnsupportedOperator { operator, kind, .. } => {
                    e.set("operator", operator.as_str());
                    e.set("kind", kind.as_str());
                }
                SubscribeError::UnknownType(type_name)
                | SubscribeError::UnknownField { type_name, .. }
                | SubscribeError::UnknownRelationshipField { type_name, .. } => {
                    e.set("type", type_name.as_str());
                }
                _ => {}
            }
        })
    }
}

#[cfg(feature = "graphql")]
impl ToGraphQLError for NormalizeError {
    fn to_graphql_error(&self) -> GraphQLError {
        let code = self.error_code();
        let message = self.to_string();

        GraphQLError::new(message).extend_with(|_, e| {
            e.set("code", code);
            if let NormalizeError::UnrecognizedOperation(tag) = self {
                e.set("operation", tag.as_str());
            }
        })
    }
}

#[cfg(feature = "graphql")]
impl ToGraphQLError for EngineError {
    fn to_graphql_error(&self) -> GraphQLError {
        match self {
            EngineError::Subscribe(err) => err.to_graphql_error(),
            EngineError::Normalize(err) => err.to_graphql_error(),
            other => {
                let code = other.error_code();
                GraphQLError::new(other.to_string()).extend_with(|_, e| e.set("code", code))
            }
        }
    }
}

#[cfg(all(test, feature = "graphql"))]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_error_extensions() {
        let err = SubscribeError::UnsupportedOperator {
            field: "releasedIn".to_string(),
            operator: "STARTS_WITH".to_string(),
            kind: "Int".to_string(),
        };
        let graphql_err = err.to_graphql_error();
        let extensions = graphql_err.extensions.expect("extensions");
        assert_eq!(
            extensions.get("code"),
            Some(&async_graphql::Value::from("VALIDATION_FAILED"))
        );
        assert_eq!(
            extensions.get("field"),
            Some(&async_graphql::Value::from("releasedIn"))
        );
    }

    #[test]
    fn test_engine_error_delegates() {
        let err = EngineError::Normalize(NormalizeError::UnrecognizedOperation("x".into()));
        let graphql_err = err.to_graphql_error();
        let extensions = graphql_err.extensions.expect("extensions");
        assert_eq!(
            extensions.get("code"),
            Some(&async_graphql::Value::from("CONFIGURATION_ERROR"))
        );
    }
}
