//! Schema metadata consumed by the type resolver
//!
//! SDL parsing happens upstream; this module only describes the shape that
//! comes out of it: concrete node types, interfaces, unions, and the
//! relationship fields declared on each node type.

mod registry;

pub use registry::{
    camel_case, pascal_case, payload_type_name, ConcreteType, InterfaceType, RelationshipField,
    RelationshipTarget, Resolution, TypeRegistry, UnionType,
};

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{SchemaError, SchemaResult};

/// Declared scalar kind of a field, which decides the filter operators it accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    #[serde(rename = "ID")]
    Id,
    String,
    Int,
    Float,
    BigInt,
    Boolean,
    DateTime,
    Enum,
}

impl ScalarKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::Float | ScalarKind::BigInt)
    }

    pub fn is_textual(self) -> bool {
        matches!(self, ScalarKind::Id | ScalarKind::String)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Id => "ID",
            ScalarKind::String => "String",
            ScalarKind::Int => "Int",
            ScalarKind::Float => "Float",
            ScalarKind::BigInt => "BigInt",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::DateTime => "DateTime",
            ScalarKind::Enum => "Enum",
        };
        f.write_str(name)
    }
}

/// Relationship direction as seen from the node that declares the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

fn default_nullable() -> bool {
    true
}

/// A scalar field on a node, interface, or relationship properties type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: ScalarKind,
    #[serde(default)]
    pub list: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            kind,
            list: false,
            nullable: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }
}

/// A relationship field declared on a node type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDefinition {
    /// GraphQL field name, e.g. `actors`
    pub name: String,
    /// Graph relationship type, e.g. `ACTED_IN`
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub direction: Direction,
    /// Concrete, union, or interface type at the other end
    pub target: String,
    /// Edge properties
    #[serde(default)]
    pub properties: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionDefinition {
    pub name: String,
    pub members: Vec<String>,
}

/// Everything the engine needs to know about the GraphQL schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    #[serde(default)]
    pub types: Vec<TypeDefinition>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDefinition>,
    #[serde(default)]
    pub unions: Vec<UnionDefinition>,
}

impl SchemaMetadata {
    pub fn from_yaml_str(source: &str) -> SchemaResult<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> SchemaResult<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load metadata from a `.json`, `.yaml` or `.yml` file
    pub fn from_path(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::Parse(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&source),
            _ => Self::from_yaml_str(&source),
        }
    }
}
