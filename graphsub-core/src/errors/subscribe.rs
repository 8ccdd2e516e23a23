//! Subscribe-time validation errors
//!
//! These are surfaced synchronously to the subscribing client. A subscription
//! that fails validation is never registered.

use thiserror::Error;

/// Errors raised while accepting a subscription
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscribeError {
    /// Target type is not a concrete type in the schema
    #[error("Type '{0}' cannot be subscribed to")]
    UnknownType(String),

    /// A `where` key or selection names a field the type does not declare
    #[error("Unknown field '{field}' on '{type_name}'")]
    UnknownField { type_name: String, field: String },

    /// Operator is not defined for the field's scalar kind
    #[error("Operator '{operator}' is not supported on {kind} field '{field}'")]
    UnsupportedOperator {
        field: String,
        operator: String,
        kind: String,
    },

    /// A `where` value has the wrong shape
    #[error("Invalid filter value for '{field}': {reason}")]
    InvalidFilterValue { field: String, reason: String },

    /// Selection set cannot be satisfied by the payload type
    #[error("Invalid selection '{path}': {reason}")]
    InvalidSelection { path: String, reason: String },

    /// Relationship-scoped operation names a field the type does not declare
    #[error("Type '{type_name}' has no relationship field '{field}'")]
    UnknownRelationshipField { type_name: String, field: String },

    /// Subscription document could not be interpreted
    #[error("Invalid subscription document: {0}")]
    InvalidDocument(String),
}

impl SubscribeError {
    /// Every subscribe error is caused by the client request
    pub fn is_client_error(&self) -> bool {
        true
    }

    /// The field this error is about, when there is one
    pub fn field(&self) -> Option<&str> {
        match self {
            SubscribeError::UnknownField { field, .. }
            | SubscribeError::UnsupportedOperator { field, .. }
            | SubscribeError::InvalidFilterValue { field, .. }
            | SubscribeError::UnknownRelationshipField { field, .. } => Some(field),
            SubscribeError::InvalidSelection { path, .. } => Some(path),
            SubscribeError::UnknownType(_) | SubscribeError::InvalidDocument(_) => None,
        }
    }

    /// Get error code for GraphQL/API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            SubscribeError::UnknownType(_)
            | SubscribeError::UnknownField { .. }
            | SubscribeError::UnknownRelationshipField { .. } => "NOT_FOUND",
            SubscribeError::UnsupportedOperator { .. }
            | SubscribeError::InvalidFilterValue { .. }
            | SubscribeError::InvalidSelection { .. } => "VALIDATION_FAILED",
            SubscribeError::InvalidDocument(_) => "BAD_REQUEST",
        }
    }
}
