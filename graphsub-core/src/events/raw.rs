//! Raw mutation records as emitted by the query layer

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Properties;

/// Property snapshots attached to a raw record.
///
/// Node records use `old`/`new`; relationship records use `from`, `to` and
/// `relationship`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Properties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Properties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Properties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Properties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<Properties>,
}

/// One record per affected entity, straight from the mutation executor.
///
/// Loosely typed on purpose: the normalizer is the only place that reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMutationRecord {
    pub event: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub typename: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: RawProperties,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub relationship_name: Option<String>,
    #[serde(default, alias = "id_from")]
    pub id_from: Option<Value>,
    #[serde(default, alias = "id_to")]
    pub id_to: Option<Value>,
    #[serde(default)]
    pub from_typename: Option<String>,
    #[serde(default)]
    pub from_labels: Vec<String>,
    #[serde(default)]
    pub to_typename: Option<String>,
    #[serde(default)]
    pub to_labels: Vec<String>,
}

impl RawMutationRecord {
    pub fn create(id: impl Into<Value>, typename: &str, properties: Properties) -> Self {
        Self {
            event: "create".to_string(),
            id: Some(id.into()),
            typename: Some(typename.to_string()),
            properties: RawProperties {
                new: Some(properties),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn update(
        id: impl Into<Value>,
        typename: &str,
        old: Properties,
        new: Properties,
    ) -> Self {
        Self {
            event: "update".to_string(),
            id: Some(id.into()),
            typename: Some(typename.to_string()),
            properties: RawProperties {
                old: Some(old),
                new: Some(new),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn delete(id: impl Into<Value>, typename: &str, properties: Properties) -> Self {
        Self {
            event: "delete".to_string(),
            id: Some(id.into()),
            typename: Some(typename.to_string()),
            properties: RawProperties {
                old: Some(properties),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// A `create_relationship` record for `(from)-[relationship_name]->(to)`
    pub fn connect(
        relationship_name: &str,
        from: (impl Into<Value>, &str, Properties),
        to: (impl Into<Value>, &str, Properties),
        properties: Properties,
    ) -> Self {
        Self::relationship("create_relationship", relationship_name, from, to, properties)
    }

    /// A `delete_relationship` record for `(from)-[relationship_name]->(to)`
    pub fn disconnect(
        relationship_name: &str,
        from: (impl Into<Value>, &str, Properties),
        to: (impl Into<Value>, &str, Properties),
        properties: Properties,
    ) -> Self {
        Self::relationship("delete_relationship", relationship_name, from, to, properties)
    }

    fn relationship(
        event: &str,
        relationship_name: &str,
        (from_id, from_typename, from_properties): (impl Into<Value>, &str, Properties),
        (to_id, to_typename, to_properties): (impl Into<Value>, &str, Properties),
        properties: Properties,
    ) -> Self {
        Self {
            event: event.to_string(),
            relationship_name: Some(relationship_name.to_string()),
            id_from: Some(from_id.into()),
            id_to: Some(to_id.into()),
            from_typename: Some(from_typename.to_string()),
            to_typename: Some(to_typename.to_string()),
            properties: RawProperties {
                from: Some(from_properties),
                to: Some(to_properties),
                relationship: Some(properties),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}
