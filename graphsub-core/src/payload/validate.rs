use indexmap::IndexMap;

use crate::errors::{SubscribeError, SubscribeResult};
use crate::schema::{
    camel_case, payload_type_name, ConcreteType, FieldDefinition, RelationshipField,
    RelationshipTarget, TypeRegistry,
};
use crate::selection::{Field, Selection, SelectionSet};
use crate::subscriptions::Operation;

const EVENT_LEAVES: [&str; 3] = ["__typename", "event", "timestamp"];
const RELATIONSHIP_LEAVES: [&str; 3] = ["direction", "relationshipFieldName", "relationshipName"];

/// Check a subscription's selection against the payload shape of
/// `operation` on `target`
pub fn validate_selection(
    registry: &TypeRegistry,
    target: &ConcreteType,
    operation: &Operation,
    selection: &SelectionSet,
) -> SubscribeResult<()> {
    let event_type = operation.event_type_name(&target.name);
    let node_key = operation.node_key(&target.name);
    let camel = camel_case(&target.name);

    walk(selection, &event_type, &mut |field: &Field| {
        let name = field.name.as_str();
        if EVENT_LEAVES.contains(&name)
            || (operation.is_relationship() && RELATIONSHIP_LEAVES.contains(&name))
        {
            expect_leaf(name, &field.selection)
        } else if name == node_key
            || name == camel
            || (name == "previousState" && *operation == Operation::Updated)
        {
            NodeShape::concrete(registry, target)
                .validate(&field.selection)
                .map_err(|err| nest(name, err))
        } else if operation.relationship_keys().iter().any(|key| *key == name) {
            validate_relationship_object(registry, target, &field.selection)
                .map_err(|err| nest(name, err))
        } else {
            Err(invalid(name, &format!("not a field of {}", event_type)))
        }
    })
}

fn validate_relationship_object(
    registry: &TypeRegistry,
    target: &ConcreteType,
    selection: &SelectionSet,
) -> SubscribeResult<()> {
    walk(selection, "", &mut |field: &Field| {
        let name = field.name.as_str();
        if name == "__typename" {
            return expect_leaf(name, &field.selection);
        }
        match target.relationship(name) {
            Some(relationship) => validate_edge_object(registry, relationship, &field.selection)
                .map_err(|err| nest(name, err)),
            None => Err(invalid(
                name,
                &format!("{} declares no such relationship", target.name),
            )),
        }
    })
}

fn validate_edge_object(
    registry: &TypeRegistry,
    relationship: &RelationshipField,
    selection: &SelectionSet,
) -> SubscribeResult<()> {
    walk(selection, "", &mut |field: &Field| {
        let name = field.name.as_str();
        if name == "node" {
            NodeShape::target(registry, &relationship.target)?
                .validate(&field.selection)
                .map_err(|err| nest(name, err))
        } else if name == "__typename" || relationship.properties.contains_key(name) {
            expect_leaf(name, &field.selection)
        } else {
            Err(invalid(name, "not an edge property"))
        }
    })
}

/// Fields a node object exposes directly, and per fragment type condition
struct NodeShape<'a> {
    /// `None` for unions, which only expose `__typename` directly
    fields: Option<&'a IndexMap<String, FieldDefinition>>,
    fragments: Vec<(String, &'a IndexMap<String, FieldDefinition>)>,
}

impl<'a> NodeShape<'a> {
    fn concrete(registry: &'a TypeRegistry, concrete: &'a ConcreteType) -> Self {
        let mut fragments = vec![(concrete.payload_type_name(), &concrete.fields)];
        for interface in &concrete.interfaces {
            if registry.interface(interface).is_some() {
                fragments.push((payload_type_name(interface), &concrete.fields));
            }
        }
        NodeShape {
            fields: Some(&concrete.fields),
            fragments,
        }
    }

    fn target(registry: &'a TypeRegistry, target: &RelationshipTarget) -> SubscribeResult<Self> {
        let unknown = || SubscribeError::UnknownType(target.type_name().to_string());
        match target {
            RelationshipTarget::Node(name) => {
                let concrete = registry.concrete(name).ok_or_else(unknown)?;
                Ok(NodeShape::concrete(registry, concrete))
            }
            RelationshipTarget::Interface(name) => {
                let interface = registry.interface(name).ok_or_else(unknown)?;
                let mut fragments = vec![(payload_type_name(name), &interface.fields)];
                fragments.extend(
                    registry
                        .possible_types(target)
                        .into_iter()
                        .map(|concrete| (concrete.payload_type_name(), &concrete.fields)),
                );
                Ok(NodeShape {
                    fields: Some(&interface.fields),
                    fragments,
                })
            }
            RelationshipTarget::Union(_) => Ok(NodeShape {
                fields: None,
                fragments: registry
                    .possible_types(target)
                    .into_iter()
                    .map(|concrete| (concrete.payload_type_name(), &concrete.fields))
                    .collect(),
            }),
        }
    }

    fn validate(&self, selection: &SelectionSet) -> SubscribeResult<()> {
        self.validate_with(selection, self.fields)
    }

    fn validate_with(
        &self,
        selection: &SelectionSet,
        fields: Option<&IndexMap<String, FieldDefinition>>,
    ) -> SubscribeResult<()> {
        for item in &selection.items {
            match item {
                Selection::Field(field) => {
                    let name = field.name.as_str();
                    let known = name == "__typename"
                        || fields.map_or(false, |fields| fields.contains_key(name));
                    if !known {
                        let reason = if fields.is_none() {
                            "select union member fields through fragments"
                        } else {
                            "unknown field"
                        };
                        return Err(invalid(name, reason));
                    }
                    expect_leaf(name, &field.selection)?;
                }
                Selection::InlineFragment {
                    type_condition: None,
                    selection,
                } => self.validate_with(selection, fields)?,
                Selection::InlineFragment {
                    type_condition: Some(condition),
                    selection,
                } => {
                    let (_, fragment_fields) = self
                        .fragments
                        .iter()
                        .find(|(name, _)| name == condition)
                        .ok_or_else(|| unrelated_fragment(condition))?;
                    self.validate_with(selection, Some(*fragment_fields))?;
                }
            }
        }
        Ok(())
    }
}

/// Visit every field of one object, descending into fragments whose type
/// condition is empty or equals `object_type`
fn walk<F>(selection: &SelectionSet, object_type: &str, visit: &mut F) -> SubscribeResult<()>
where
    F: FnMut(&Field) -> SubscribeResult<()>,
{
    for item in &selection.items {
        match item {
            Selection::Field(field) => visit(field)?,
            Selection::InlineFragment {
                type_condition,
                selection,
            } => match type_condition {
                Some(condition) if condition != object_type => {
                    return Err(unrelated_fragment(condition))
                }
                _ => walk(selection, object_type, visit)?,
            },
        }
    }
    Ok(())
}

fn expect_leaf(name: &str, selection: &SelectionSet) -> SubscribeResult<()> {
    if selection.is_empty() {
        Ok(())
    } else {
        Err(invalid(name, "leaf field cannot have a sub-selection"))
    }
}

fn invalid(path: &str, reason: &str) -> SubscribeError {
    SubscribeError::InvalidSelection {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn unrelated_fragment(condition: &str) -> SubscribeError {
    invalid("", &format!("fragment on unrelated type {}", condition))
}

/// Anchor an error from a nested object under the field holding it
fn nest(parent: &str, err: SubscribeError) -> SubscribeError {
    match err {
        SubscribeError::InvalidSelection { path, reason } => SubscribeError::InvalidSelection {
            path: if path.is_empty() {
                parent.to_string()
            } else {
                format!("{}.{}", parent, path)
            },
            reason,
        },
        other => other,
    }
}
