mod common;

use common::{engine, movie, node, props, subscribe};
use graphsub::RawMutationRecord;
use serde_json::json;

fn directed(director: (i64, &'static str, graphsub::events::Properties)) -> RawMutationRecord {
    RawMutationRecord::connect(
        "DIRECTED",
        director,
        movie(2, json!({ "title": "The Matrix" })),
        props(json!({ "year": 1999 })),
    )
}

fn reviewed(reviewer: (i64, &'static str, graphsub::events::Properties)) -> RawMutationRecord {
    RawMutationRecord::connect(
        "REVIEWED",
        reviewer,
        movie(2, json!({ "title": "The Matrix" })),
        props(json!({ "score": 8.0 })),
    )
}

#[tokio::test]
async fn test_union_field_exposes_only_the_connected_member() {
    let engine = engine();
    let (_, _, mut events) = subscribe(
        &engine,
        r#"subscription {
            movieConnected {
                relationship {
                    directors {
                        year
                        node {
                            __typename
                            ... on PersonEventPayload { name reputation }
                            ... on ActorEventPayload { name }
                        }
                    }
                }
            }
        }"#,
    );

    engine
        .emit(directed(node(3, "Person", json!({ "name": "Lana", "reputation": 10 }))))
        .unwrap();
    engine
        .emit(directed(node(1, "Actor", json!({ "name": "Keanu" }))))
        .unwrap();

    assert_eq!(
        events.next().await["movieConnected"]["relationship"]["directors"],
        json!({
            "year": 1999,
            "node": { "__typename": "PersonEventPayload", "name": "Lana", "reputation": 10 }
        })
    );
    assert_eq!(
        events.next().await["movieConnected"]["relationship"]["directors"],
        json!({
            "year": 1999,
            "node": { "__typename": "ActorEventPayload", "name": "Keanu" }
        })
    );
}

#[tokio::test]
async fn test_interface_field_exposes_common_fields_and_own_fragment() {
    let engine = engine();
    let (_, _, mut events) = subscribe(
        &engine,
        r#"subscription {
            movieConnected {
                relationship {
                    reviewers {
                        score
                        node {
                            reputation
                            ... on PersonEventPayload { name }
                            ... on InfluencerEventPayload { url }
                        }
                    }
                }
            }
        }"#,
    );

    engine
        .emit(reviewed(node(3, "Person", json!({ "name": "Roger", "reputation": 5 }))))
        .unwrap();
    engine
        .emit(reviewed(node(
            4,
            "Influencer",
            json!({ "url": "https://example.com", "reputation": 2 }),
        )))
        .unwrap();

    assert_eq!(
        events.next().await["movieConnected"]["relationship"]["reviewers"]["node"],
        json!({ "reputation": 5, "name": "Roger" })
    );
    assert_eq!(
        events.next().await["movieConnected"]["relationship"]["reviewers"]["node"],
        json!({ "reputation": 2, "url": "https://example.com" })
    );
}

#[tokio::test]
async fn test_union_member_filters_apply_to_their_own_branch() {
    let engine = engine();
    let (_, _, mut events) = subscribe(
        &engine,
        r#"subscription {
            movieConnected(where: {
                relationship: { directors: { Person: { node: { reputation_GT: 5 } } } }
            }) {
                relationship { directors { node { ... on PersonEventPayload { name } ... on ActorEventPayload { name } } } }
            }
        }"#,
    );

    engine
        .emit(directed(node(3, "Person", json!({ "name": "Lana", "reputation": 3 }))))
        .unwrap();
    engine
        .emit(directed(node(5, "Person", json!({ "name": "Lilly", "reputation": 9 }))))
        .unwrap();
    engine
        .emit(directed(node(1, "Actor", json!({ "name": "Keanu" }))))
        .unwrap();

    let names: Vec<_> = events
        .drain()
        .await
        .into_iter()
        .map(|payload| payload["movieConnected"]["relationship"]["directors"]["node"]["name"].clone())
        .collect();
    assert_eq!(names, vec![json!("Lilly"), json!("Keanu")]);
}

#[tokio::test]
async fn test_unresolved_concrete_type_only_reaches_common_field_selections() {
    let engine = engine();
    let (_, _, mut common_only) = subscribe(
        &engine,
        "subscription { movieConnected { relationship { reviewers { node { reputation } } } } }",
    );
    let (_, _, mut narrowing) = subscribe(
        &engine,
        r#"subscription {
            movieConnected {
                relationship { reviewers { node { reputation ... on PersonEventPayload { name } } } }
            }
        }"#,
    );

    let mut record = reviewed(node(9, "Critic", json!({ "reputation": 7 })));
    record.from_labels = vec!["Critic".to_string(), "Reviewer".to_string()];
    engine.emit(record).unwrap();

    assert_eq!(
        common_only.next().await["movieConnected"]["relationship"]["reviewers"]["node"],
        json!({ "reputation": 7 })
    );
    narrowing.assert_silent().await;
    assert_eq!(engine.stats().suppressed, 1);
}

#[tokio::test]
async fn test_unknown_other_node_is_dropped() {
    let engine = engine();
    let (_, _, mut events) = subscribe(&engine, "subscription { movieConnected { event } }");

    engine
        .emit(directed(node(9, "Studio", json!({ "name": "Warner" }))))
        .unwrap();
    events.assert_silent().await;
}
