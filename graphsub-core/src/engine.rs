//! Lifecycle-scoped subscription engine
//!
//! Created when the server starts and shut down when it stops. Nothing here
//! is global: tests build as many engines as they like and feed them
//! synthetic event streams.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult, SubscribeError};
use crate::events::{normalize, MutationEvent, RawMutationRecord};
use crate::filter::{compile_node_where, compile_relationship_where};
use crate::payload::validate_selection;
use crate::schema::{SchemaMetadata, TypeRegistry};
use crate::subscriptions::{
    spawn_worker, DispatchCommand, Dispatcher, EngineStats, NewSubscription, StatsSnapshot,
    Subscription, SubscriptionHandle, SubscriptionRegistry, SubscriptionRequest, Transport,
};

/// Accepts subscriptions and raw mutation records, and delivers matching
/// payloads to each subscription's transport.
///
/// Must be started from within a tokio runtime.
pub struct SubscriptionEngine {
    schema: Arc<TypeRegistry>,
    config: EngineConfig,
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<EngineStats>,
    command_tx: mpsc::UnboundedSender<DispatchCommand>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl SubscriptionEngine {
    pub fn start(schema: impl Into<Arc<TypeRegistry>>, config: EngineConfig) -> Self {
        let schema = schema.into();
        let stats = Arc::new(EngineStats::default());
        let registry = Arc::new(SubscriptionRegistry::new(Arc::clone(&stats)));
        let (command_tx, dispatcher) = Dispatcher::spawn(
            Arc::clone(&schema),
            Arc::clone(&registry),
            Arc::clone(&stats),
            config.clone(),
        );

        info!(
            "Subscription engine started with {} types, queue capacity {}",
            schema.concrete_types().count(),
            config.queue_capacity
        );

        Self {
            schema,
            config,
            registry,
            stats,
            command_tx,
            dispatcher: Mutex::new(Some(dispatcher)),
            workers: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Build the type registry from `metadata` and start an engine on it
    pub fn from_metadata(metadata: SchemaMetadata, config: EngineConfig) -> EngineResult<Self> {
        let schema = TypeRegistry::from_metadata(metadata)?;
        Ok(Self::start(schema, config))
    }

    pub fn schema(&self) -> &TypeRegistry {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub(crate) fn shared_registry(&self) -> Arc<SubscriptionRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Hand one raw record to the engine.
    ///
    /// Returns once the typed event is queued for dispatch; delivery happens
    /// asynchronously, in emission order. An unrecognized operation tag is a
    /// fatal error: the event source and the engine disagree on the protocol.
    pub fn emit(&self, record: RawMutationRecord) -> EngineResult<()> {
        match normalize(record) {
            Ok(Some(event)) => self.emit_event(event),
            Ok(None) => Ok(()),
            Err(err) => {
                if !err.is_fatal() {
                    warn!("Rejecting mutation record: {}", err);
                }
                Err(err.into())
            }
        }
    }

    /// Queue an already typed event for dispatch
    pub fn emit_event(&self, event: MutationEvent) -> EngineResult<()> {
        if self.is_shut_down() {
            return Err(EngineError::ShutDown);
        }
        self.command_tx
            .send(DispatchCommand::Event(event))
            .map_err(|_| EngineError::ShutDown)
    }

    /// Validate `request` and register it.
    ///
    /// Every check happens here: a subscription that fails one is never
    /// registered and never sees an event.
    pub fn subscribe(
        &self,
        request: SubscriptionRequest,
        transport: Arc<dyn Transport>,
    ) -> EngineResult<SubscriptionHandle> {
        if self.is_shut_down() {
            return Err(EngineError::ShutDown);
        }

        let target = self
            .schema
            .concrete(&request.target_type)
            .ok_or_else(|| SubscribeError::UnknownType(request.target_type.clone()))?;

        if let Some(field) = request.operation.scope_field() {
            if target.relationship(field).is_none() {
                return Err(SubscribeError::UnknownRelationshipField {
                    type_name: target.name.clone(),
                    field: field.to_string(),
                }
                .into());
            }
        }

        let filter = if request.operation.is_relationship() {
            compile_relationship_where(&self.schema, target, &request.where_arg)?
        } else {
            compile_node_where(target, &request.where_arg)?
        };
        validate_selection(&self.schema, target, &request.operation, &request.selection)?;

        let response_key = request
            .response_key
            .unwrap_or_else(|| request.operation.root_field_name(&target.name));
        let (subscription, receiver) = Subscription::new(
            NewSubscription {
                target_type: target.name.clone(),
                operation: request.operation,
                filter,
                selection: request.selection,
                response_key,
                transport,
            },
            self.config.queue_capacity,
        );
        let handle = subscription.handle;

        let worker = spawn_worker(
            Arc::clone(&subscription),
            receiver,
            Arc::clone(&self.registry),
            Arc::clone(&self.stats),
        );
        self.registry.insert(subscription);

        let mut workers = match self.workers.lock() {
            Ok(workers) => workers,
            Err(poisoned) => poisoned.into_inner(),
        };
        workers.retain(|worker| !worker.is_finished());
        workers.push(worker);

        Ok(handle)
    }

    /// Close a subscription. Returns false if it was not active.
    ///
    /// Once this returns, nothing more is delivered to it.
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.registry.close(handle).await
    }

    /// Wait until every event emitted so far has been handed to subscription
    /// queues
    pub async fn flush(&self) -> EngineResult<()> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(DispatchCommand::Flush(tx))
            .map_err(|_| EngineError::ShutDown)?;
        rx.await.map_err(|_| EngineError::ShutDown)
    }

    /// Stop accepting events and subscriptions, deliver what is already
    /// queued within `shutdown_grace`, then close every subscription
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Subscription engine shutting down");

        let (tx, rx) = oneshot::channel();
        if self.command_tx.send(DispatchCommand::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
        let dispatcher = match self.dispatcher.lock() {
            Ok(mut dispatcher) => dispatcher.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(dispatcher) = dispatcher {
            let _ = dispatcher.await;
        }

        // Subscriptions registered while the dispatcher was stopping
        for handle in self.registry.handles() {
            if let Some(subscription) = self.registry.get(handle) {
                subscription.seal();
            }
        }

        let workers = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        // Queued payloads get the grace period; a client that is not reading
        // does not hold shutdown up past it
        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace;
        let mut stalled = Vec::new();
        for mut worker in workers {
            if tokio::time::timeout_at(deadline, &mut worker).await.is_err() {
                stalled.push(worker);
            }
        }
        if !stalled.is_empty() {
            warn!(
                "{} subscriptions still delivering after {:?}, abandoning their queues",
                stalled.len(),
                self.config.shutdown_grace
            );
        }

        for handle in self.registry.handles() {
            self.registry.close(handle).await;
        }
        for worker in stalled {
            let _ = worker.await;
        }
        info!("Subscription engine stopped");
    }
}
