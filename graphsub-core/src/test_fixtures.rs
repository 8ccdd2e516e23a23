//! Movie schema shared by unit tests

use serde_json::Value;

use crate::events::Properties;
use crate::schema::{
    Direction, FieldDefinition, InterfaceDefinition, RelationshipDefinition, ScalarKind,
    SchemaMetadata, TypeDefinition, TypeRegistry, UnionDefinition,
};

fn relationship(
    name: &str,
    relationship_type: &str,
    direction: Direction,
    target: &str,
    properties: Vec<FieldDefinition>,
) -> RelationshipDefinition {
    RelationshipDefinition {
        name: name.to_string(),
        relationship_type: relationship_type.to_string(),
        direction,
        target: target.to_string(),
        properties,
    }
}

pub fn metadata() -> SchemaMetadata {
    SchemaMetadata {
        types: vec![
            TypeDefinition {
                name: "Movie".to_string(),
                implements: vec![],
                fields: vec![
                    FieldDefinition::new("id", ScalarKind::Id).required(),
                    FieldDefinition::new("title", ScalarKind::String),
                    FieldDefinition::new("releasedIn", ScalarKind::Int),
                    FieldDefinition::new("averageRating", ScalarKind::Float),
                    FieldDefinition::new("boxOffice", ScalarKind::BigInt),
                    FieldDefinition::new("premiere", ScalarKind::DateTime),
                    FieldDefinition::new("tags", ScalarKind::String).list(),
                ],
                relationships: vec![
                    relationship(
                        "actors",
                        "ACTED_IN",
                        Direction::In,
                        "Actor",
                        vec![FieldDefinition::new("screenTime", ScalarKind::Int)],
                    ),
                    relationship(
                        "directors",
                        "DIRECTED",
                        Direction::In,
                        "Director",
                        vec![FieldDefinition::new("year", ScalarKind::Int)],
                    ),
                    relationship(
                        "reviewers",
                        "REVIEWED",
                        Direction::In,
                        "Reviewer",
                        vec![FieldDefinition::new("score", ScalarKind::Float)],
                    ),
                ],
            },
            TypeDefinition {
                name: "Actor".to_string(),
                implements: vec![],
                fields: vec![FieldDefinition::new("name", ScalarKind::String).required()],
                relationships: vec![
                    relationship(
                        "movies",
                        "ACTED_IN",
                        Direction::Out,
                        "Movie",
                        vec![FieldDefinition::new("screenTime", ScalarKind::Int)],
                    ),
                    relationship(
                        "directed",
                        "DIRECTED",
                        Direction::Out,
                        "Movie",
                        vec![FieldDefinition::new("year", ScalarKind::Int)],
                    ),
                ],
            },
            TypeDefinition {
                name: "Person".to_string(),
                implements: vec!["Reviewer".to_string()],
                fields: vec![
                    FieldDefinition::new("name", ScalarKind::String).required(),
                    FieldDefinition::new("reputation", ScalarKind::Int),
                ],
                relationships: vec![relationship(
                    "reviewed",
                    "REVIEWED",
                    Direction::Out,
                    "Movie",
                    vec![FieldDefinition::new("score", ScalarKind::Float)],
                )],
            },
            TypeDefinition {
                name: "Influencer".to_string(),
                implements: vec!["Reviewer".to_string()],
                fields: vec![
                    FieldDefinition::new("url", ScalarKind::String),
                    FieldDefinition::new("reputation", ScalarKind::Int),
                ],
                relationships: vec![],
            },
        ],
        interfaces: vec![InterfaceDefinition {
            name: "Reviewer".to_string(),
            fields: vec![FieldDefinition::new("reputation", ScalarKind::Int)],
        }],
        unions: vec![UnionDefinition {
            name: "Director".to_string(),
            members: vec!["Person".to_string(), "Actor".to_string()],
        }],
    }
}

pub fn registry() -> TypeRegistry {
    TypeRegistry::from_metadata(metadata()).unwrap()
}

pub fn props(value: Value) -> Properties {
    value.as_object().cloned().unwrap_or_default()
}
