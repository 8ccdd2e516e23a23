//! Per-endpoint views of relationship events
//!
//! A relationship is stored once, in graph direction. Each endpoint whose
//! type declares the relationship in the matching direction sees it as its
//! own CONNECT/DISCONNECT, with the opposite endpoint as the other node.

use tracing::debug;

use super::{NodeSnapshot, Properties, RelationshipEvent};
use crate::schema::{ConcreteType, Direction, RelationshipField, Resolution, TypeRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    From,
    To,
}

impl Endpoint {
    pub const BOTH: [Endpoint; 2] = [Endpoint::From, Endpoint::To];

    /// Direction of the relationship as seen from this endpoint
    pub fn direction(self) -> Direction {
        match self {
            Endpoint::From => Direction::Out,
            Endpoint::To => Direction::In,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Endpoint::From => Endpoint::To,
            Endpoint::To => Endpoint::From,
        }
    }
}

/// A relationship event oriented from one endpoint's declared field
#[derive(Debug, Clone)]
pub struct OrientedRelationship<'e, 'r> {
    pub relationship_type_name: &'e str,
    pub field: &'r RelationshipField,
    pub direction: Direction,
    pub properties: &'e Properties,
    pub node: &'e NodeSnapshot,
    pub node_type: &'r ConcreteType,
    pub other_node: &'e NodeSnapshot,
    pub other_resolution: Resolution<'r>,
}

impl RelationshipEvent {
    /// Orient this relationship from `endpoint`.
    ///
    /// `None` when the endpoint's type is unknown, when the other node
    /// resolves to nothing, or when the endpoint's type declares no field
    /// for this relationship in this direction.
    pub fn orient<'e, 'r>(
        &'e self,
        registry: &'r TypeRegistry,
        endpoint: Endpoint,
    ) -> Option<OrientedRelationship<'e, 'r>> {
        let node = self.node(endpoint);
        let other_node = self.node(endpoint.opposite());

        let node_type = registry
            .resolve_labels(&node.type_name, &node.labels)
            .concrete()?;

        let other_resolution = registry.resolve_labels(&other_node.type_name, &other_node.labels);
        if !other_resolution.is_found() {
            debug!(
                "Dropping {} relationship: other node type '{}' is not registered",
                self.relationship_type_name, other_node.type_name
            );
            return None;
        }

        let direction = endpoint.direction();
        let field = registry.find_relationship_field(
            node_type,
            &self.relationship_type_name,
            direction,
            &other_resolution,
        );
        let Some(field) = field else {
            debug!(
                "{} declares no {} field for {} relationship",
                node_type.name,
                direction.as_str(),
                self.relationship_type_name
            );
            return None;
        };

        Some(OrientedRelationship {
            relationship_type_name: &self.relationship_type_name,
            field,
            direction,
            properties: &self.properties,
            node,
            node_type,
            other_node,
            other_resolution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        FieldDefinition, RelationshipDefinition, ScalarKind, SchemaMetadata, TypeDefinition,
    };

    fn snapshot(id: &str, type_name: &str) -> NodeSnapshot {
        NodeSnapshot {
            id: id.to_string(),
            type_name: type_name.to_string(),
            labels: vec![],
            properties: Properties::new(),
        }
    }

    fn registry(actor_declares_movies: bool) -> TypeRegistry {
        let acted_in = |name: &str, direction, target: &str| RelationshipDefinition {
            name: name.to_string(),
            relationship_type: "ACTED_IN".to_string(),
            direction,
            target: target.to_string(),
            properties: vec![],
        };
        let mut actor_relationships = vec![];
        if actor_declares_movies {
            actor_relationships.push(acted_in("movies", Direction::Out, "Movie"));
        }
        TypeRegistry::from_metadata(SchemaMetadata {
            types: vec![
                TypeDefinition {
                    name: "Movie".to_string(),
                    implements: vec![],
                    fields: vec![FieldDefinition::new("title", ScalarKind::String)],
                    relationships: vec![acted_in("actors", Direction::In, "Actor")],
                },
                TypeDefinition {
                    name: "Actor".to_string(),
                    implements: vec![],
                    fields: vec![FieldDefinition::new("name", ScalarKind::String)],
                    relationships: actor_relationships,
                },
            ],
            ..Default::default()
        })
        .unwrap()
    }

    fn acted_in() -> RelationshipEvent {
        RelationshipEvent {
            relationship_type_name: "ACTED_IN".to_string(),
            properties: Properties::new(),
            from: snapshot("a1", "Actor"),
            to: snapshot("m1", "Movie"),
            timestamp: 0,
        }
    }

    #[test]
    fn test_both_sides_see_opposite_directions() {
        let registry = registry(true);
        let event = acted_in();

        let from_actor = event.orient(&registry, Endpoint::From).unwrap();
        assert_eq!(from_actor.field.field_name, "movies");
        assert_eq!(from_actor.direction, Direction::Out);
        assert_eq!(from_actor.other_node.id, "m1");

        let from_movie = event.orient(&registry, Endpoint::To).unwrap();
        assert_eq!(from_movie.field.field_name, "actors");
        assert_eq!(from_movie.direction, Direction::In);
        assert_eq!(from_movie.other_node.id, "a1");
    }

    #[test]
    fn test_non_reciprocal_side_is_skipped() {
        let registry = registry(false);
        let event = acted_in();

        assert!(event.orient(&registry, Endpoint::From).is_none());
        assert!(event.orient(&registry, Endpoint::To).is_some());
    }

    #[test]
    fn test_unknown_other_node_drops_event() {
        let registry = registry(true);
        let mut event = acted_in();
        event.from.type_name = "Stuntman".to_string();

        assert!(event.orient(&registry, Endpoint::To).is_none());
    }
}
