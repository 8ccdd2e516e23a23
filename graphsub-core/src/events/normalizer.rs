use serde_json::Value;
use tracing::{debug, error};

use super::{
    EventKind, MutationEvent, NodeEvent, NodeSnapshot, NodeUpdate, Properties, RawMutationRecord,
    RelationshipEvent,
};
use crate::errors::{NormalizeError, NormalizeResult};

/// Map a raw operation tag to an event kind. The mapping is total: anything
/// not listed here means the event source speaks a different protocol.
fn event_kind(tag: &str) -> NormalizeResult<EventKind> {
    match tag.to_ascii_lowercase().as_str() {
        "create" => Ok(EventKind::Create),
        "update" => Ok(EventKind::Update),
        "delete" => Ok(EventKind::Delete),
        "create_relationship" | "connect" => Ok(EventKind::Connect),
        "delete_relationship" | "disconnect" => Ok(EventKind::Disconnect),
        _ => Err(NormalizeError::UnrecognizedOperation(tag.to_string())),
    }
}

/// Convert one raw record into at most one typed event.
///
/// Returns `Ok(None)` for updates that changed nothing.
pub fn normalize(record: RawMutationRecord) -> NormalizeResult<Option<MutationEvent>> {
    let kind = event_kind(&record.event).map_err(|err| {
        error!("Event source emitted unrecognized operation tag '{}'", record.event);
        err
    })?;
    let timestamp = record
        .timestamp
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

    let event = match kind {
        EventKind::Create => MutationEvent::Created(NodeEvent {
            node: node_snapshot(record.id, record.typename, record.labels, record.properties.new)?,
            timestamp,
        }),
        EventKind::Delete => MutationEvent::Deleted(NodeEvent {
            node: node_snapshot(record.id, record.typename, record.labels, record.properties.old)?,
            timestamp,
        }),
        EventKind::Update => {
            let previous_properties = record.properties.old.unwrap_or_default();
            let node = node_snapshot(
                record.id,
                record.typename,
                record.labels,
                record.properties.new,
            )?;
            if node.properties == previous_properties {
                debug!("Skipping no-op update of {} {}", node.type_name, node.id);
                return Ok(None);
            }
            MutationEvent::Updated(NodeUpdate {
                node,
                previous_properties,
                timestamp,
            })
        }
        EventKind::Connect | EventKind::Disconnect => {
            let relationship_event = relationship_event(record, timestamp)?;
            if kind == EventKind::Connect {
                MutationEvent::Connected(relationship_event)
            } else {
                MutationEvent::Disconnected(relationship_event)
            }
        }
    };

    Ok(Some(event))
}

fn relationship_event(
    record: RawMutationRecord,
    timestamp: i64,
) -> NormalizeResult<RelationshipEvent> {
    let relationship_type_name = record
        .relationship_name
        .ok_or_else(|| NormalizeError::MissingRelationship(record.event.clone()))?;
    let mut properties = record.properties;

    let from = node_snapshot(
        record.id_from,
        record.from_typename,
        record.from_labels,
        properties.from.take(),
    )?;
    let to = node_snapshot(
        record.id_to,
        record.to_typename,
        record.to_labels,
        properties.to.take(),
    )?;

    Ok(RelationshipEvent {
        relationship_type_name,
        properties: properties.relationship.unwrap_or_default(),
        from,
        to,
        timestamp,
    })
}

fn node_snapshot(
    id: Option<Value>,
    typename: Option<String>,
    labels: Vec<String>,
    properties: Option<Properties>,
) -> NormalizeResult<NodeSnapshot> {
    let id = match id {
        Some(Value::String(id)) => id,
        Some(Value::Number(id)) => id.to_string(),
        _ => return Err(NormalizeError::Malformed { missing: "id" }),
    };
    let type_name = typename
        .filter(|t| !t.is_empty())
        .or_else(|| labels.first().cloned())
        .ok_or(NormalizeError::Malformed { missing: "type tag" })?;

    Ok(NodeSnapshot {
        id,
        type_name,
        labels,
        properties: properties.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_uses_post_image() {
        let record = RawMutationRecord::create(1, "Movie", props(json!({ "title": "Up" })))
            .with_timestamp(42);

        let event = normalize(record).unwrap().unwrap();
        assert_eq!(event.kind(), EventKind::Create);
        assert_eq!(event.timestamp(), 42);
        match event {
            MutationEvent::Created(created) => {
                assert_eq!(created.node.id, "1");
                assert_eq!(created.node.properties.get("title"), Some(&json!("Up")));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_delete_uses_pre_image() {
        let record = RawMutationRecord::delete("m1", "Movie", props(json!({ "title": "Gone" })));

        match normalize(record).unwrap().unwrap() {
            MutationEvent::Deleted(deleted) => {
                assert_eq!(deleted.node.properties.get("title"), Some(&json!("Gone")));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_update_keeps_previous_properties() {
        let record = RawMutationRecord::update(
            1,
            "Movie",
            props(json!({ "title": "Old" })),
            props(json!({ "title": "New" })),
        );

        match normalize(record).unwrap().unwrap() {
            MutationEvent::Updated(update) => {
                assert_eq!(update.previous_properties.get("title"), Some(&json!("Old")));
                assert_eq!(update.node.properties.get("title"), Some(&json!("New")));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_noop_update_is_skipped() {
        let same = props(json!({ "title": "Same" }));
        let record = RawMutationRecord::update(1, "Movie", same.clone(), same);
        assert_eq!(normalize(record).unwrap(), None);
    }

    #[test]
    fn test_relationship_aliases() {
        for tag in ["create_relationship", "CONNECT", "connect"] {
            let mut record = RawMutationRecord::connect(
                "ACTED_IN",
                (1, "Actor", Properties::new()),
                (2, "Movie", Properties::new()),
                props(json!({ "screenTime": 10 })),
            );
            record.event = tag.to_string();

            let event = normalize(record).unwrap().unwrap();
            assert_eq!(event.kind(), EventKind::Connect);
            let relationship = event.relationship().unwrap();
            assert_eq!(relationship.from.type_name, "Actor");
            assert_eq!(relationship.to.id, "2");
        }
    }

    #[test]
    fn test_unrecognized_tag_is_configuration_error() {
        let mut record = RawMutationRecord::create(1, "Movie", Properties::new());
        record.event = "merge".to_string();

        let err = normalize(record).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_id_or_type_is_malformed() {
        let mut record = RawMutationRecord::create(1, "Movie", Properties::new());
        record.id = None;
        assert_eq!(
            normalize(record).unwrap_err(),
            NormalizeError::Malformed { missing: "id" }
        );

        let mut record = RawMutationRecord::create(1, "Movie", Properties::new());
        record.typename = None;
        assert_eq!(
            normalize(record).unwrap_err(),
            NormalizeError::Malformed { missing: "type tag" }
        );
    }

    #[test]
    fn test_labels_supply_missing_type_tag() {
        let mut record =
            RawMutationRecord::create(1, "Movie", Properties::new()).with_labels(&["Movie"]);
        record.typename = None;

        match normalize(record).unwrap().unwrap() {
            MutationEvent::Created(created) => assert_eq!(created.node.type_name, "Movie"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_relationship_without_name() {
        let mut record = RawMutationRecord::connect(
            "ACTED_IN",
            (1, "Actor", Properties::new()),
            (2, "Movie", Properties::new()),
            Properties::new(),
        );
        record.relationship_name = None;

        assert!(matches!(
            normalize(record).unwrap_err(),
            NormalizeError::MissingRelationship(_)
        ));
    }
}
