//! Offline replay of recorded mutation records against a set of
//! subscription documents

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::engine::SubscriptionEngine;
use crate::errors::{EngineError, EngineResult, TransportError};
use crate::events::RawMutationRecord;
use crate::graphql::parse_subscription;
use crate::schema::TypeRegistry;
use crate::subscriptions::{StatsSnapshot, SubscriptionHandle, Transport};

/// One subscription document to register before replaying
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySubscription {
    pub document: String,
    #[serde(default)]
    pub variables: Value,
    #[serde(default)]
    pub operation_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
    /// Delivered payloads; each subscription's are in emission order
    pub payloads: Vec<Value>,
    /// Records the normalizer refused
    pub rejected: usize,
    pub stats: StatsSnapshot,
}

#[derive(Default)]
struct CollectingTransport {
    payloads: Mutex<Vec<Value>>,
}

#[async_trait]
impl Transport for CollectingTransport {
    async fn deliver(&self, _handle: SubscriptionHandle, payload: Value) -> Result<(), TransportError> {
        let mut payloads = self
            .payloads
            .lock()
            .map_err(|_| TransportError::Rejected("collector poisoned".to_string()))?;
        payloads.push(payload);
        Ok(())
    }
}

/// Register `subscriptions`, emit `records` in order and collect everything
/// delivered.
///
/// Malformed records are skipped and counted. An unrecognized operation tag
/// aborts the replay.
pub async fn replay(
    schema: TypeRegistry,
    config: EngineConfig,
    subscriptions: &[ReplaySubscription],
    records: Vec<RawMutationRecord>,
) -> EngineResult<ReplayReport> {
    let engine = SubscriptionEngine::start(schema, config);
    let collector = Arc::new(CollectingTransport::default());

    for subscription in subscriptions {
        let request = parse_subscription(
            engine.schema(),
            &subscription.document,
            &subscription.variables,
            subscription.operation_name.as_deref(),
        )?;
        let transport: Arc<dyn Transport> = Arc::clone(&collector) as Arc<dyn Transport>;
        engine.subscribe(request, transport)?;
    }
    info!("Replaying {} records against {} subscriptions", records.len(), subscriptions.len());

    let mut rejected = 0;
    for record in records {
        match engine.emit(record) {
            Ok(()) => {}
            Err(err) if err.is_fatal() => {
                engine.shutdown().await;
                return Err(err);
            }
            Err(EngineError::Normalize(err)) => {
                warn!("Skipping record: {}", err);
                rejected += 1;
            }
            Err(err) => return Err(err),
        }
    }

    engine.shutdown().await;
    let payloads = match collector.payloads.lock() {
        Ok(mut payloads) => std::mem::take(&mut *payloads),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    };

    Ok(ReplayReport {
        payloads,
        rejected,
        stats: engine.stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{props, registry};
    use serde_json::json;

    fn subscription(document: &str) -> ReplaySubscription {
        ReplaySubscription {
            document: document.to_string(),
            variables: Value::Null,
            operation_name: None,
        }
    }

    #[tokio::test]
    async fn test_replay_collects_payloads() {
        let report = replay(
            registry(),
            EngineConfig::default(),
            &[subscription(
                r#"subscription { movieCreated(where: { title_CONTAINS: "a" }) { createdMovie { title } } }"#,
            )],
            vec![
                RawMutationRecord::create(1, "Movie", props(json!({ "title": "Heat" }))),
                RawMutationRecord::create(2, "Movie", props(json!({ "title": "Se7en" }))),
                RawMutationRecord {
                    event: "create".to_string(),
                    ..Default::default()
                },
                RawMutationRecord::create(3, "Movie", props(json!({ "title": "Casablanca" }))),
            ],
        )
        .await
        .unwrap();

        assert_eq!(
            report.payloads,
            vec![
                json!({ "movieCreated": { "createdMovie": { "title": "Heat" } } }),
                json!({ "movieCreated": { "createdMovie": { "title": "Casablanca" } } }),
            ]
        );
        assert_eq!(report.rejected, 1);
        assert_eq!(report.stats.filtered, 1);
        assert_eq!(report.stats.closed, 1);
    }

    #[tokio::test]
    async fn test_replay_stops_on_unknown_operation() {
        let mut record = RawMutationRecord::create(1, "Movie", props(json!({})));
        record.event = "upsert".to_string();

        let err = replay(registry(), EngineConfig::default(), &[], vec![record])
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
