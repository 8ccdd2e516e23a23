//! Schema metadata errors
//!
//! Raised while building the type registry. Every variant describes a
//! schema that disagrees with itself, so all of them are configuration errors.

use thiserror::Error;

/// Errors raised while validating schema metadata
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two definitions share a name
    #[error("Type '{0}' is defined more than once")]
    DuplicateType(String),

    /// A reference names a type that is not defined
    #[error("Type '{referenced}' referenced by '{by}' is not defined")]
    UnknownType {
        /// The missing type
        referenced: String,
        /// Where it was referenced from
        by: String,
    },

    /// A union lists a member that is not a concrete node type
    #[error("Union '{union}' member '{member}' is not a concrete type")]
    InvalidUnionMember { union: String, member: String },

    /// A type claims an interface but lacks one of its fields
    #[error("Type '{type_name}' implements '{interface}' but does not declare field '{field}'")]
    MissingInterfaceField {
        type_name: String,
        interface: String,
        field: String,
    },

    /// A field or relationship name is declared twice on a type
    #[error("Field '{field}' is declared more than once on '{type_name}'")]
    DuplicateField { type_name: String, field: String },

    /// Schema file could not be parsed
    #[error("Failed to parse schema metadata: {0}")]
    Parse(String),
}

impl SchemaError {
    /// Get error code for GraphQL/API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            SchemaError::Parse(_) => "SCHEMA_PARSE_FAILED",
            _ => "SCHEMA_INVALID",
        }
    }
}

impl From<serde_yaml::Error> for SchemaError {
    fn from(err: serde_yaml::Error) -> Self {
        SchemaError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Parse(err.to_string())
    }
}
