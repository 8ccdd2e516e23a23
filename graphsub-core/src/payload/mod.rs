//! Payload builder
//!
//! Shapes one event into the payload one subscription asked for. Building is
//! done per subscription, never shared, since selections differ.
//!
//! Relationship payloads follow two conventions:
//!
//! - the relationship object carries a key for every relationship field the
//!   subscribing type declares, `null` for all but the one that fired;
//! - the node at the other end is narrowed to its concrete type, so union
//!   and interface fragments only ever see the fields of that type.

mod validate;

pub use validate::validate_selection;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::events::{EventKind, NodeSnapshot, OrientedRelationship, Properties};
use crate::filter::{EvaluationContext, RelationshipContext};
use crate::schema::{
    camel_case, pascal_case, payload_type_name, ConcreteType, FieldDefinition, RelationshipTarget,
    Resolution, TypeRegistry,
};
use crate::selection::{merged_selection, SelectionSet};
use crate::subscriptions::Operation;

/// One event as seen by subscriptions on one node type
#[derive(Debug, Clone)]
pub enum EventView<'e, 'r> {
    Node {
        kind: EventKind,
        node: &'e NodeSnapshot,
        node_type: &'r ConcreteType,
        /// Pre-image, for updates
        previous: Option<&'e Properties>,
        timestamp: i64,
    },
    Relationship {
        kind: EventKind,
        relationship: OrientedRelationship<'e, 'r>,
        timestamp: i64,
    },
}

impl<'e, 'r> EventView<'e, 'r> {
    pub fn kind(&self) -> EventKind {
        match self {
            EventView::Node { kind, .. } | EventView::Relationship { kind, .. } => *kind,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            EventView::Node { timestamp, .. } | EventView::Relationship { timestamp, .. } => {
                *timestamp
            }
        }
    }

    pub fn node_type(&self) -> &'r ConcreteType {
        match self {
            EventView::Node { node_type, .. } => *node_type,
            EventView::Relationship { relationship, .. } => relationship.node_type,
        }
    }

    pub fn node(&self) -> &'e NodeSnapshot {
        match self {
            EventView::Node { node, .. } => *node,
            EventView::Relationship { relationship, .. } => relationship.node,
        }
    }

    /// Relationship field the event fired through
    pub fn relationship_field(&self) -> Option<&'r str> {
        match self {
            EventView::Node { .. } => None,
            EventView::Relationship { relationship, .. } => {
                Some(relationship.field.field_name.as_str())
            }
        }
    }

    pub fn evaluation_context(&self) -> EvaluationContext<'_> {
        let node_type = self.node_type();
        let ctx = EvaluationContext::node(&self.node().properties, &node_type.name);
        match self {
            EventView::Node { .. } => ctx,
            EventView::Relationship { relationship, .. } => {
                ctx.with_relationship(RelationshipContext {
                    field_name: &relationship.field.field_name,
                    edge: relationship.properties,
                    other_node: &relationship.other_node.properties,
                    other_type: relationship
                        .other_resolution
                        .concrete()
                        .map(|concrete| concrete.name.as_str()),
                })
            }
        }
    }
}

/// Builds subscription payloads against one type registry
#[derive(Debug, Clone, Copy)]
pub struct PayloadBuilder<'r> {
    registry: &'r TypeRegistry,
    relationship_key: &'r str,
}

impl<'r> PayloadBuilder<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            relationship_key: "relationship",
        }
    }

    /// Key used for the relationship object when a subscription selects
    /// nothing
    pub fn with_relationship_key(mut self, key: &'r str) -> Self {
        self.relationship_key = key;
        self
    }

    /// Build the event object for `selection`.
    ///
    /// `None` when the selection needs the concrete type of a node that only
    /// resolved to interfaces; nothing should be delivered then.
    pub fn build(
        &self,
        operation: &Operation,
        view: &EventView<'_, '_>,
        selection: &SelectionSet,
    ) -> Option<Value> {
        let node_type = view.node_type();
        let default_selection;
        let selection = if selection.is_empty() {
            default_selection = self.default_selection(operation, node_type);
            &default_selection
        } else {
            selection
        };

        let event_type = operation.event_type_name(&node_type.name);
        let node_key = operation.node_key(&node_type.name);
        let camel = camel_case(&node_type.name);

        let mut object = Map::new();
        for (key, fields) in selection.collect_fields(&|condition: &str| condition == event_type) {
            let name = fields[0].name.as_str();
            let sub_selection = merged_selection(&fields);

            let value = match (name, view) {
                ("__typename", _) => Value::String(event_type.clone()),
                ("event", _) => Value::from(view.kind().as_str()),
                ("timestamp", _) => Value::from(view.timestamp()),
                (name, _) if name == node_key || name == camel => {
                    node_object(node_type, &view.node().properties, &sub_selection)
                }
                ("previousState", EventView::Node { previous, .. }) => match previous {
                    Some(previous) => node_object(node_type, previous, &sub_selection),
                    None => Value::Null,
                },
                ("direction", EventView::Relationship { relationship, .. }) => {
                    Value::from(relationship.direction.as_str())
                }
                (
                    "relationshipFieldName" | "relationshipName",
                    EventView::Relationship { relationship, .. },
                ) => Value::from(relationship.field.field_name.as_str()),
                (name, EventView::Relationship { relationship, .. })
                    if operation.relationship_keys().iter().any(|k| *k == name) =>
                {
                    self.relationship_object(operation, relationship, &sub_selection)?
                }
                _ => continue,
            };
            object.insert(key.to_string(), value);
        }

        Some(Value::Object(object))
    }

    fn default_selection(&self, operation: &Operation, node_type: &ConcreteType) -> SelectionSet {
        let mut selection = SelectionSet::new().field(operation.node_key(&node_type.name));
        if *operation == Operation::Updated {
            selection = selection.field("previousState");
        }
        selection = selection.field("event").field("timestamp");
        if operation.is_relationship() {
            let keys = operation.relationship_keys();
            let key = keys
                .iter()
                .copied()
                .find(|k| *k == self.relationship_key)
                .unwrap_or("relationship");
            selection = selection
                .field("direction")
                .field("relationshipFieldName")
                .field(key);
        }
        selection
    }

    fn relationship_object(
        &self,
        operation: &Operation,
        relationship: &OrientedRelationship<'_, '_>,
        selection: &SelectionSet,
    ) -> Option<Value> {
        let node_type = relationship.node_type;
        let fired = relationship.field.field_name.as_str();
        let mut object = Map::new();

        if selection.is_empty() {
            for name in node_type.relationships.keys() {
                let value = if name == fired {
                    self.edge_object(relationship, selection)?
                } else {
                    Value::Null
                };
                object.insert(name.clone(), value);
            }
            return Some(Value::Object(object));
        }

        let fields = selection.collect_fields(&|_: &str| true);
        let mut seen = Vec::with_capacity(fields.len());
        for (key, fields) in &fields {
            let name = fields[0].name.as_str();
            let value = if name == "__typename" {
                Value::String(format!(
                    "{}{}Relationship",
                    node_type.name,
                    operation.label()
                ))
            } else if name == fired {
                self.edge_object(relationship, &merged_selection(fields))?
            } else if node_type.relationships.contains_key(name) {
                Value::Null
            } else {
                continue;
            };
            seen.push(name);
            object.insert(key.to_string(), value);
        }

        // Unselected relationship fields still get their key
        for name in node_type.relationships.keys() {
            if seen.contains(&name.as_str()) {
                continue;
            }
            let value = if name == fired {
                Value::Object(Map::new())
            } else {
                Value::Null
            };
            object.insert(name.clone(), value);
        }

        Some(Value::Object(object))
    }

    /// `{ <edge properties>, node }` for the field that fired
    fn edge_object(
        &self,
        relationship: &OrientedRelationship<'_, '_>,
        selection: &SelectionSet,
    ) -> Option<Value> {
        let field = relationship.field;
        let mut object = Map::new();

        if selection.is_empty() {
            for name in field.properties.keys() {
                object.insert(name.clone(), property(relationship.properties, name));
            }
            object.insert("node".to_string(), self.other_node(relationship, selection)?);
            return Some(Value::Object(object));
        }

        for (key, fields) in selection.collect_fields(&|_: &str| true) {
            let name = fields[0].name.as_str();
            let value = match name {
                "__typename" => Value::String(format!(
                    "{}{}Relationship",
                    relationship.node_type.name,
                    pascal_case(&field.field_name)
                )),
                "node" => self.other_node(relationship, &merged_selection(&fields))?,
                name if field.properties.contains_key(name) => {
                    property(relationship.properties, name)
                }
                _ => continue,
            };
            object.insert(key.to_string(), value);
        }
        Some(Value::Object(object))
    }

    /// The other endpoint, narrowed to its concrete type
    fn other_node(
        &self,
        relationship: &OrientedRelationship<'_, '_>,
        selection: &SelectionSet,
    ) -> Option<Value> {
        let properties = &relationship.other_node.properties;
        match (&relationship.field.target, &relationship.other_resolution) {
            (target, Resolution::Concrete(concrete)) => Some(scalar_object(
                &concrete.payload_type_name(),
                &concrete.fields,
                properties,
                selection,
                &concrete_conditions(concrete),
                target.is_polymorphic(),
            )),
            (RelationshipTarget::Interface(name), Resolution::Partial(_)) => {
                let interface = self.registry.interface(name)?;
                let interface_payload = payload_type_name(name);
                let needs_concrete = selection.selects("__typename")
                    || selection
                        .type_conditions()
                        .iter()
                        .any(|condition| *condition != interface_payload);
                if needs_concrete {
                    debug!(
                        "Suppressing {} payload: '{}' resolved to interfaces only",
                        relationship.field.field_name, relationship.other_node.type_name
                    );
                    return None;
                }
                Some(scalar_object(
                    &interface_payload,
                    &interface.fields,
                    properties,
                    selection,
                    &[interface_payload.clone()],
                    false,
                ))
            }
            _ => None,
        }
    }
}

/// Payload type names a fragment on a node of type `concrete` may use
fn concrete_conditions(concrete: &ConcreteType) -> Vec<String> {
    std::iter::once(concrete.payload_type_name())
        .chain(concrete.interfaces.iter().map(|i| payload_type_name(i)))
        .collect()
}

fn node_object(concrete: &ConcreteType, properties: &Properties, selection: &SelectionSet) -> Value {
    scalar_object(
        &concrete.payload_type_name(),
        &concrete.fields,
        properties,
        selection,
        &concrete_conditions(concrete),
        false,
    )
}

fn scalar_object(
    type_name: &str,
    fields: &IndexMap<String, FieldDefinition>,
    properties: &Properties,
    selection: &SelectionSet,
    conditions: &[String],
    typename_by_default: bool,
) -> Value {
    let mut object = Map::new();

    if selection.is_empty() {
        if typename_by_default {
            object.insert("__typename".to_string(), Value::from(type_name));
        }
        for name in fields.keys() {
            object.insert(name.clone(), property(properties, name));
        }
        return Value::Object(object);
    }

    let applies = |condition: &str| conditions.iter().any(|c| c == condition);
    for (key, selected) in selection.collect_fields(&applies) {
        let name = selected[0].name.as_str();
        let value = if name == "__typename" {
            Value::from(type_name)
        } else if fields.contains_key(name) {
            property(properties, name)
        } else {
            continue;
        };
        object.insert(key.to_string(), value);
    }
    Value::Object(object)
}

fn property(properties: &Properties, name: &str) -> Value {
    properties.get(name).cloned().unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Endpoint, RelationshipEvent};
    use crate::test_fixtures::{props, registry};
    use serde_json::json;

    fn snapshot(id: &str, type_name: &str, properties: Value) -> NodeSnapshot {
        NodeSnapshot {
            id: id.to_string(),
            type_name: type_name.to_string(),
            labels: vec![],
            properties: props(properties),
        }
    }

    fn relationship(
        relationship_type: &str,
        from: NodeSnapshot,
        to: NodeSnapshot,
        properties: Value,
    ) -> RelationshipEvent {
        RelationshipEvent {
            relationship_type_name: relationship_type.to_string(),
            properties: props(properties),
            from,
            to,
            timestamp: 7,
        }
    }

    #[test]
    fn test_created_payload_follows_selection() {
        let registry = registry();
        let movie = registry.concrete("Movie").unwrap();
        let node = snapshot("1", "Movie", json!({ "title": "Heat", "releasedIn": 1995 }));
        let view = EventView::Node {
            kind: EventKind::Create,
            node: &node,
            node_type: movie,
            previous: None,
            timestamp: 7,
        };
        let selection = SelectionSet::new()
            .object("createdMovie", SelectionSet::new().field("title").field("__typename"))
            .field("event")
            .field("timestamp");

        let payload = PayloadBuilder::new(&registry)
            .build(&Operation::Created, &view, &selection)
            .unwrap();
        assert_eq!(
            payload,
            json!({
                "createdMovie": { "title": "Heat", "__typename": "MovieEventPayload" },
                "event": "CREATE",
                "timestamp": 7
            })
        );
    }

    #[test]
    fn test_update_payload_has_previous_state() {
        let registry = registry();
        let movie = registry.concrete("Movie").unwrap();
        let node = snapshot("1", "Movie", json!({ "title": "Heat 2" }));
        let previous = props(json!({ "title": "Heat" }));
        let view = EventView::Node {
            kind: EventKind::Update,
            node: &node,
            node_type: movie,
            previous: Some(&previous),
            timestamp: 7,
        };
        let selection = SelectionSet::new()
            .object("updatedMovie", SelectionSet::new().field("title"))
            .object("previousState", SelectionSet::new().field("title"))
            .field("__typename");

        let payload = PayloadBuilder::new(&registry)
            .build(&Operation::Updated, &view, &selection)
            .unwrap();
        assert_eq!(
            payload,
            json!({
                "updatedMovie": { "title": "Heat 2" },
                "previousState": { "title": "Heat" },
                "__typename": "MovieUpdatedEvent"
            })
        );
    }

    #[test]
    fn test_connect_payload_nulls_siblings_and_narrows_union() {
        let registry = registry();
        let event = relationship(
            "DIRECTED",
            snapshot("a1", "Actor", json!({ "name": "Keanu" })),
            snapshot("m1", "Movie", json!({ "title": "Heat" })),
            json!({ "year": 1995 }),
        );
        let view = EventView::Relationship {
            kind: EventKind::Connect,
            relationship: event.orient(&registry, Endpoint::To).unwrap(),
            timestamp: 7,
        };
        let node_selection = SelectionSet::new()
            .field("__typename")
            .on("PersonEventPayload", SelectionSet::new().field("name").field("reputation"))
            .on("ActorEventPayload", SelectionSet::new().field("name"));
        let selection = SelectionSet::new()
            .object("movie", SelectionSet::new().field("title"))
            .field("event")
            .field("direction")
            .field("relationshipFieldName")
            .object(
                "relationship",
                SelectionSet::new()
                    .object("actors", SelectionSet::new().field("screenTime"))
                    .object(
                        "directors",
                        SelectionSet::new().field("year").object("node", node_selection),
                    ),
            );

        let payload = PayloadBuilder::new(&registry)
            .build(&Operation::Connected, &view, &selection)
            .unwrap();
        assert_eq!(
            payload,
            json!({
                "movie": { "title": "Heat" },
                "event": "CONNECT",
                "direction": "IN",
                "relationshipFieldName": "directors",
                "relationship": {
                    "actors": null,
                    "directors": {
                        "year": 1995,
                        "node": { "__typename": "ActorEventPayload", "name": "Keanu" }
                    },
                    "reviewers": null
                }
            })
        );
    }

    #[test]
    fn test_interface_node_gets_common_fields_and_own_fragment() {
        let registry = registry();
        let event = relationship(
            "REVIEWED",
            snapshot("i1", "Influencer", json!({ "url": "http://x", "reputation": 3 })),
            snapshot("m1", "Movie", json!({ "title": "Heat" })),
            json!({ "score": 4.5 }),
        );
        let view = EventView::Relationship {
            kind: EventKind::Connect,
            relationship: event.orient(&registry, Endpoint::To).unwrap(),
            timestamp: 7,
        };
        let selection = SelectionSet::new().object(
            "createdRelationship",
            SelectionSet::new().object(
                "reviewers",
                SelectionSet::new().object(
                    "node",
                    SelectionSet::new()
                        .field("reputation")
                        .on("PersonEventPayload", SelectionSet::new().field("name"))
                        .on("InfluencerEventPayload", SelectionSet::new().field("url")),
                ),
            ),
        );

        let payload = PayloadBuilder::new(&registry)
            .build(&Operation::Connected, &view, &selection)
            .unwrap();
        assert_eq!(
            payload["createdRelationship"]["reviewers"]["node"],
            json!({ "reputation": 3, "url": "http://x" })
        );
        assert_eq!(payload["createdRelationship"]["actors"], Value::Null);
    }

    #[test]
    fn test_partial_resolution_suppresses_only_when_narrowing_is_needed() {
        let registry = registry();
        let mut critic = snapshot("c1", "Critic", json!({ "reputation": 9 }));
        critic.labels = vec!["Critic".to_string(), "Reviewer".to_string()];
        let event = relationship(
            "REVIEWED",
            critic,
            snapshot("m1", "Movie", json!({})),
            json!({}),
        );
        let view = EventView::Relationship {
            kind: EventKind::Connect,
            relationship: event.orient(&registry, Endpoint::To).unwrap(),
            timestamp: 7,
        };
        let builder = PayloadBuilder::new(&registry);

        let common = SelectionSet::new().object(
            "relationship",
            SelectionSet::new().object(
                "reviewers",
                SelectionSet::new().object("node", SelectionSet::new().field("reputation")),
            ),
        );
        let payload = builder.build(&Operation::Connected, &view, &common).unwrap();
        assert_eq!(payload["relationship"]["reviewers"]["node"], json!({ "reputation": 9 }));

        let narrowing = SelectionSet::new().object(
            "relationship",
            SelectionSet::new().object(
                "reviewers",
                SelectionSet::new().object(
                    "node",
                    SelectionSet::new().on("PersonEventPayload", SelectionSet::new().field("name")),
                ),
            ),
        );
        assert!(builder.build(&Operation::Connected, &view, &narrowing).is_none());
    }

    #[test]
    fn test_empty_selection_builds_everything() {
        let registry = registry();
        let event = relationship(
            "ACTED_IN",
            snapshot("a1", "Actor", json!({ "name": "Al" })),
            snapshot("m1", "Movie", json!({ "title": "Heat" })),
            json!({ "screenTime": 90 }),
        );
        let view = EventView::Relationship {
            kind: EventKind::Disconnect,
            relationship: event.orient(&registry, Endpoint::From).unwrap(),
            timestamp: 7,
        };

        let payload = PayloadBuilder::new(&registry)
            .with_relationship_key("deletedRelationship")
            .build(&Operation::Disconnected, &view, &SelectionSet::new())
            .unwrap();
        assert_eq!(payload["disconnectedActor"], json!({ "name": "Al" }));
        assert_eq!(payload["direction"], json!("OUT"));
        assert_eq!(payload["relationshipFieldName"], json!("movies"));
        assert_eq!(payload["deletedRelationship"]["directed"], Value::Null);
        assert_eq!(
            payload["deletedRelationship"]["movies"]["node"]["title"],
            json!("Heat")
        );
        assert_eq!(payload["deletedRelationship"]["movies"]["screenTime"], json!(90));
    }
}
