use std::fmt;

use crate::errors::{SubscribeError, SubscribeResult};
use crate::events::EventKind;
use crate::schema::{camel_case, pascal_case, ConcreteType, TypeRegistry};

/// What a subscription listens for on its target type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Created,
    Updated,
    Deleted,
    Connected,
    Disconnected,
    /// Connections made through one relationship field only
    RelationshipConnected(String),
    /// Disconnections made through one relationship field only
    RelationshipDisconnected(String),
}

/// Root field suffixes, most specific first
const ROOT_SUFFIXES: [(&str, EventKind); 7] = [
    ("RelationshipCreated", EventKind::Connect),
    ("RelationshipDeleted", EventKind::Disconnect),
    ("Disconnected", EventKind::Disconnect),
    ("Connected", EventKind::Connect),
    ("Created", EventKind::Create),
    ("Updated", EventKind::Update),
    ("Deleted", EventKind::Delete),
];

impl Operation {
    pub fn event_kind(&self) -> EventKind {
        match self {
            Operation::Created => EventKind::Create,
            Operation::Updated => EventKind::Update,
            Operation::Deleted => EventKind::Delete,
            Operation::Connected | Operation::RelationshipConnected(_) => EventKind::Connect,
            Operation::Disconnected | Operation::RelationshipDisconnected(_) => {
                EventKind::Disconnect
            }
        }
    }

    pub fn is_relationship(&self) -> bool {
        self.event_kind().is_relationship()
    }

    /// Relationship field the operation is scoped to
    pub fn scope_field(&self) -> Option<&str> {
        match self {
            Operation::RelationshipConnected(field) | Operation::RelationshipDisconnected(field) => {
                Some(field)
            }
            _ => None,
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self.event_kind() {
            EventKind::Create => "Created",
            EventKind::Update => "Updated",
            EventKind::Delete => "Deleted",
            EventKind::Connect => "Connected",
            EventKind::Disconnect => "Disconnected",
        }
    }

    /// Subscription root field, e.g. `movieCreated` or `movieActorsConnected`
    pub fn root_field_name(&self, type_name: &str) -> String {
        match self.scope_field() {
            Some(field) => format!("{}{}{}", camel_case(type_name), pascal_case(field), self.label()),
            None => format!("{}{}", camel_case(type_name), self.label()),
        }
    }

    /// `__typename` of the event object, e.g. `MovieCreatedEvent`
    pub fn event_type_name(&self, type_name: &str) -> String {
        match self.scope_field() {
            Some(field) => format!("{}{}{}Event", type_name, pascal_case(field), self.label()),
            None => format!("{}{}Event", type_name, self.label()),
        }
    }

    /// Key holding the subscribing node, e.g. `createdMovie`
    pub fn node_key(&self, type_name: &str) -> String {
        format!("{}{}", self.label().to_ascii_lowercase(), type_name)
    }

    /// Keys that may hold the relationship object
    pub fn relationship_keys(&self) -> &'static [&'static str] {
        match self.event_kind() {
            EventKind::Connect => &["relationship", "createdRelationship"],
            EventKind::Disconnect => &["relationship", "deletedRelationship"],
            _ => &[],
        }
    }

    /// Resolve a subscription root field name to its target type and
    /// operation
    pub fn parse_root_field<'r>(
        registry: &'r TypeRegistry,
        field_name: &str,
    ) -> SubscribeResult<(&'r ConcreteType, Operation)> {
        let unknown = || SubscribeError::UnknownField {
            type_name: "Subscription".to_string(),
            field: field_name.to_string(),
        };

        let (prefix, kind) = ROOT_SUFFIXES
            .iter()
            .find_map(|(suffix, kind)| {
                field_name
                    .strip_suffix(suffix)
                    .filter(|prefix| !prefix.is_empty())
                    .map(|prefix| (prefix, *kind))
            })
            .ok_or_else(unknown)?;

        // Exact type match first, then the longest type prefix
        let mut best: Option<(&ConcreteType, String)> = None;
        for concrete in registry.concrete_types() {
            let camel = camel_case(&concrete.name);
            if prefix == camel {
                return Ok((concrete, Operation::unscoped(kind)));
            }
            if prefix.starts_with(&camel) && best.as_ref().map_or(true, |(_, b)| camel.len() > b.len()) {
                best = Some((concrete, camel));
            }
        }

        let (concrete, camel) = best.ok_or_else(unknown)?;
        if !kind.is_relationship() {
            return Err(unknown());
        }
        let field = camel_case(&prefix[camel.len()..]);
        if concrete.relationship(&field).is_none() {
            return Err(SubscribeError::UnknownRelationshipField {
                type_name: concrete.name.clone(),
                field,
            });
        }
        let operation = if kind == EventKind::Connect {
            Operation::RelationshipConnected(field)
        } else {
            Operation::RelationshipDisconnected(field)
        };
        Ok((concrete, operation))
    }

    fn unscoped(kind: EventKind) -> Operation {
        match kind {
            EventKind::Create => Operation::Created,
            EventKind::Update => Operation::Updated,
            EventKind::Delete => Operation::Deleted,
            EventKind::Connect => Operation::Connected,
            EventKind::Disconnect => Operation::Disconnected,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope_field() {
            Some(field) => write!(f, "{}({})", self.label().to_ascii_uppercase(), field),
            None => f.write_str(&self.label().to_ascii_uppercase()),
        }
    }
}
