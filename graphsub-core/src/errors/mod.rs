//! Domain-specific error types for graphsub
//!
//! Errors are grouped by the stage of the event pipeline that raises them,
//! which is also how callers are expected to react to them.
//!
//! # Error Categories
//!
//! - **SchemaError**: schema metadata that cannot back a type resolver (fatal at startup)
//! - **NormalizeError**: raw mutation records the normalizer cannot accept
//! - **SubscribeError**: `where`/selection validation at subscribe time
//! - **TransportError**: delivery failures, treated as an implicit unsubscribe
//! - **EngineError**: the engine façade, wrapping the above
//!
//! # GraphQL Integration
//!
//! When the `graphql` feature is enabled, error types can be converted to GraphQL errors
//! with structured error codes and extensions using the `ToGraphQLError` trait.
//!
//! # Examples
//!
//! ```rust
//! use graphsub::errors::{NormalizeError, SubscribeError};
//!
//! let err = NormalizeError::UnrecognizedOperation("merge".to_string());
//! assert!(err.is_fatal());
//!
//! let err = SubscribeError::UnsupportedOperator {
//!     field: "releasedIn".to_string(),
//!     operator: "CONTAINS".to_string(),
//!     kind: "Int".to_string(),
//! };
//! assert!(err.is_client_error());
//! ```

pub mod common;
pub mod engine;
pub mod normalize;
pub mod schema;
pub mod subscribe;
pub mod transport;

pub use engine::EngineError;
pub use normalize::NormalizeError;
pub use schema::SchemaError;
pub use subscribe::SubscribeError;
pub use transport::TransportError;

#[cfg(feature = "graphql")]
pub use common::ToGraphQLError;

/// Result type alias for schema loading and type registry construction
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type alias for raw record normalization
pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// Result type alias for subscribe-time validation
pub type SubscribeResult<T> = Result<T, SubscribeError>;

/// Result type alias for the engine façade
pub type EngineResult<T> = Result<T, EngineError>;
