use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{EngineStats, Enqueued, Subscription, SubscriptionRegistry};
use crate::config::EngineConfig;
use crate::events::{Endpoint, MutationEvent};
use crate::filter::matches;
use crate::payload::{EventView, PayloadBuilder};
use crate::schema::TypeRegistry;

pub(crate) enum DispatchCommand {
    Event(MutationEvent),
    /// Answered once every earlier event has been handed to its queues
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Single task that takes typed events off the dispatch queue in emission
/// order and fans them out to subscription queues
pub(crate) struct Dispatcher {
    schema: Arc<TypeRegistry>,
    subscriptions: Arc<SubscriptionRegistry>,
    stats: Arc<EngineStats>,
    config: EngineConfig,
    command_rx: mpsc::UnboundedReceiver<DispatchCommand>,
}

impl Dispatcher {
    pub(crate) fn spawn(
        schema: Arc<TypeRegistry>,
        subscriptions: Arc<SubscriptionRegistry>,
        stats: Arc<EngineStats>,
        config: EngineConfig,
    ) -> (mpsc::UnboundedSender<DispatchCommand>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            schema,
            subscriptions,
            stats,
            config,
            command_rx: rx,
        };

        let task = tokio::spawn(async move {
            dispatcher.run().await;
        });

        info!("Dispatcher spawned");
        (tx, task)
    }

    async fn run(mut self) {
        info!("Dispatcher event loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                DispatchCommand::Event(event) => self.dispatch(&event),

                DispatchCommand::Flush(response) => {
                    let _ = response.send(());
                }

                DispatchCommand::Shutdown(response) => {
                    info!(
                        "Dispatcher shutting down, sealing {} subscriptions",
                        self.subscriptions.len()
                    );
                    for handle in self.subscriptions.handles() {
                        if let Some(subscription) = self.subscriptions.get(handle) {
                            subscription.seal();
                        }
                    }
                    let _ = response.send(());
                    break;
                }
            }
        }

        info!("Dispatcher event loop ended");
    }

    fn dispatch(&self, event: &MutationEvent) {
        self.stats.record_event();
        let deliveries = plan_deliveries(
            &self.schema,
            &self.subscriptions,
            &self.stats,
            &self.config.default_relationship_key,
            event,
        );

        for (subscription, payload) in deliveries {
            match subscription.enqueue(payload) {
                Enqueued::Queued => {}
                Enqueued::Full => {
                    self.stats.record_overflow();
                    warn!(
                        "Queue of subscription {} is full, dropping {} event",
                        subscription.handle,
                        event.kind()
                    );
                    if self.config.close_on_overflow {
                        if let Some(detached) = self.subscriptions.detach(subscription.handle) {
                            tokio::spawn(SubscriptionRegistry::finish_close(detached));
                        }
                    }
                }
                Enqueued::Closed => {
                    debug!(
                        "Subscription {} closed before {} event was queued",
                        subscription.handle,
                        event.kind()
                    );
                }
            }
        }
    }
}

/// Work out which subscriptions receive `event` and with which payload.
///
/// Relationship events are looked at once from each endpoint; an endpoint
/// whose type declares no matching relationship field gets nothing.
pub(crate) fn plan_deliveries(
    schema: &TypeRegistry,
    subscriptions: &SubscriptionRegistry,
    stats: &EngineStats,
    relationship_key: &str,
    event: &MutationEvent,
) -> Vec<(Arc<Subscription>, Value)> {
    let builder = PayloadBuilder::new(schema).with_relationship_key(relationship_key);
    let mut deliveries = Vec::new();

    match event {
        MutationEvent::Created(e) | MutationEvent::Deleted(e) => {
            let Some(node_type) = schema.resolve_labels(&e.node.type_name, &e.node.labels).concrete()
            else {
                debug!("Dropping {} event: type '{}' is not registered", event.kind(), e.node.type_name);
                return deliveries;
            };
            let view = EventView::Node {
                kind: event.kind(),
                node: &e.node,
                node_type,
                previous: None,
                timestamp: e.timestamp,
            };
            plan_view(&builder, subscriptions, stats, &view, &mut deliveries);
        }
        MutationEvent::Updated(e) => {
            let Some(node_type) = schema.resolve_labels(&e.node.type_name, &e.node.labels).concrete()
            else {
                debug!("Dropping UPDATE event: type '{}' is not registered", e.node.type_name);
                return deliveries;
            };
            let view = EventView::Node {
                kind: event.kind(),
                node: &e.node,
                node_type,
                previous: Some(&e.previous_properties),
                timestamp: e.timestamp,
            };
            plan_view(&builder, subscriptions, stats, &view, &mut deliveries);
        }
        MutationEvent::Connected(e) | MutationEvent::Disconnected(e) => {
            for endpoint in Endpoint::BOTH {
                let Some(relationship) = e.orient(schema, endpoint) else {
                    continue;
                };
                let view = EventView::Relationship {
                    kind: event.kind(),
                    relationship,
                    timestamp: e.timestamp,
                };
                plan_view(&builder, subscriptions, stats, &view, &mut deliveries);
            }
        }
    }

    deliveries
}

fn plan_view(
    builder: &PayloadBuilder<'_>,
    subscriptions: &SubscriptionRegistry,
    stats: &EngineStats,
    view: &EventView<'_, '_>,
    deliveries: &mut Vec<(Arc<Subscription>, Value)>,
) {
    let node_type = view.node_type();
    let ctx = view.evaluation_context();

    for subscription in subscriptions.candidates(&node_type.name, view.kind()) {
        if let Some(scope) = subscription.operation.scope_field() {
            if view.relationship_field() != Some(scope) {
                continue;
            }
        }

        if !matches(&ctx, &subscription.filter) {
            stats.record_filtered();
            debug!(
                "Subscription {} filtered out {} {}",
                subscription.handle,
                view.kind(),
                view.node().id
            );
            continue;
        }

        match builder.build(&subscription.operation, view, &subscription.selection) {
            Some(payload) => {
                let mut envelope = Map::new();
                envelope.insert(subscription.response_key.clone(), payload);
                deliveries.push((subscription, Value::Object(envelope)));
            }
            None => {
                stats.record_suppressed();
                debug!(
                    "Subscription {} needs a concrete type the event does not carry, suppressed",
                    subscription.handle
                );
            }
        }
    }
}

/// Drain one subscription's queue into its transport.
///
/// Each delivery holds the subscription's delivery lock, so a concurrent
/// close either happens before the delivery starts or waits for it to end.
/// Closing also cancels a delivery the client is not accepting, so that wait
/// is never longer than one poll.
pub(crate) fn spawn_worker(
    subscription: Arc<Subscription>,
    mut receiver: mpsc::Receiver<Value>,
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<EngineStats>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(payload) = receiver.recv().await {
            let guard = subscription.delivery.lock().await;
            // Registered before the state check so a close in between is not missed
            let cancelled = subscription.cancel.notified();
            tokio::pin!(cancelled);
            cancelled.as_mut().enable();
            if subscription.is_closed() {
                break;
            }

            let outcome = tokio::select! {
                biased;
                _ = &mut cancelled => None,
                result = subscription.transport.deliver(subscription.handle, payload) => Some(result),
            };
            match outcome {
                None => {
                    debug!(
                        "Subscription {} closed mid-delivery, payload abandoned",
                        subscription.handle
                    );
                    break;
                }
                Some(Ok(())) => stats.record_delivered(),
                Some(Err(err)) => {
                    drop(guard);
                    warn!(
                        "Delivery to subscription {} failed, closing it: {}",
                        subscription.handle, err
                    );
                    registry.close(subscription.handle).await;
                    break;
                }
            }
        }
        debug!("Worker for subscription {} stopped", subscription.handle);
    })
}
