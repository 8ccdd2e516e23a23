//! Typed mutation events
//!
//! Raw records are converted exactly once, at the normalizer boundary, into
//! the closed [`MutationEvent`] enum. Everything downstream matches on it
//! exhaustively.

mod normalizer;
mod orientation;
mod raw;

pub use normalizer::normalize;
pub use orientation::{Endpoint, OrientedRelationship};
pub use raw::{RawMutationRecord, RawProperties};

use std::fmt;

use serde_json::{Map, Value};

/// Field name to scalar value snapshot
pub type Properties = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    Update,
    Delete,
    Connect,
    Disconnect,
}

impl EventKind {
    /// Literal used in the `event` payload field
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Create => "CREATE",
            EventKind::Update => "UPDATE",
            EventKind::Delete => "DELETE",
            EventKind::Connect => "CONNECT",
            EventKind::Disconnect => "DISCONNECT",
        }
    }

    pub fn is_relationship(self) -> bool {
        matches!(self, EventKind::Connect | EventKind::Disconnect)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node as it was when the event happened
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: String,
    pub type_name: String,
    pub labels: Vec<String>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeEvent {
    pub node: NodeSnapshot,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpdate {
    /// Post-image
    pub node: NodeSnapshot,
    pub previous_properties: Properties,
    pub timestamp: i64,
}

/// One relationship change between two nodes.
///
/// Stored once, in graph direction. Each endpoint gets its own oriented view
/// through [`RelationshipEvent::orient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipEvent {
    pub relationship_type_name: String,
    pub properties: Properties,
    pub from: NodeSnapshot,
    pub to: NodeSnapshot,
    pub timestamp: i64,
}

impl RelationshipEvent {
    pub fn node(&self, endpoint: Endpoint) -> &NodeSnapshot {
        match endpoint {
            Endpoint::From => &self.from,
            Endpoint::To => &self.to,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationEvent {
    Created(NodeEvent),
    Updated(NodeUpdate),
    Deleted(NodeEvent),
    Connected(RelationshipEvent),
    Disconnected(RelationshipEvent),
}

impl MutationEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MutationEvent::Created(_) => EventKind::Create,
            MutationEvent::Updated(_) => EventKind::Update,
            MutationEvent::Deleted(_) => EventKind::Delete,
            MutationEvent::Connected(_) => EventKind::Connect,
            MutationEvent::Disconnected(_) => EventKind::Disconnect,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            MutationEvent::Created(e) | MutationEvent::Deleted(e) => e.timestamp,
            MutationEvent::Updated(e) => e.timestamp,
            MutationEvent::Connected(e) | MutationEvent::Disconnected(e) => e.timestamp,
        }
    }

    pub fn relationship(&self) -> Option<&RelationshipEvent> {
        match self {
            MutationEvent::Connected(e) | MutationEvent::Disconnected(e) => Some(e),
            _ => None,
        }
    }
}
