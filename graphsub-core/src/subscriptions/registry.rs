use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info};

use super::{EngineStats, Operation, SubscriptionHandle, Transport};
use crate::events::EventKind;
use crate::filter::FilterTree;
use crate::selection::SelectionSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    /// Terminal
    Closed,
}

/// Outcome of handing a payload to a subscription's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    Full,
    Closed,
}

/// An accepted subscription with its compiled filter and outbound queue
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub target_type: String,
    pub operation: Operation,
    pub filter: FilterTree,
    pub selection: SelectionSet,
    /// Top-level key of every delivered payload
    pub response_key: String,
    pub(crate) transport: Arc<dyn Transport>,
    queue: Mutex<Option<mpsc::Sender<Value>>>,
    closed: AtomicBool,
    /// Held for the whole of one delivery
    pub(crate) delivery: tokio::sync::Mutex<()>,
    /// Fired on close; aborts a delivery that is still waiting on the client
    pub(crate) cancel: Notify,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("handle", &self.handle)
            .field("target_type", &self.target_type)
            .field("operation", &self.operation)
            .field("response_key", &self.response_key)
            .field("state", &self.state())
            .finish()
    }
}

pub(crate) struct NewSubscription {
    pub target_type: String,
    pub operation: Operation,
    pub filter: FilterTree,
    pub selection: SelectionSet,
    pub response_key: String,
    pub transport: Arc<dyn Transport>,
}

impl Subscription {
    pub(crate) fn new(
        new: NewSubscription,
        queue_capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Value>) {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let subscription = Subscription {
            handle: SubscriptionHandle::new(),
            target_type: new.target_type,
            operation: new.operation,
            filter: new.filter,
            selection: new.selection,
            response_key: new.response_key,
            transport: new.transport,
            queue: Mutex::new(Some(sender)),
            closed: AtomicBool::new(false),
            delivery: tokio::sync::Mutex::new(()),
            cancel: Notify::new(),
        };
        (Arc::new(subscription), receiver)
    }

    pub fn state(&self) -> SubscriptionState {
        if self.is_closed() {
            SubscriptionState::Closed
        } else {
            SubscriptionState::Active
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Non-blocking handoff to the delivery worker
    pub(crate) fn enqueue(&self, payload: Value) -> Enqueued {
        let queue = match self.queue.lock() {
            Ok(queue) => queue,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(sender) = queue.as_ref().filter(|_| !self.is_closed()) else {
            return Enqueued::Closed;
        };
        match sender.try_send(payload) {
            Ok(()) => Enqueued::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Enqueued::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Enqueued::Closed,
        }
    }

    /// Stop accepting payloads but let the worker drain what is queued
    pub(crate) fn seal(&self) {
        let mut queue = match self.queue.lock() {
            Ok(queue) => queue,
            Err(poisoned) => poisoned.into_inner(),
        };
        queue.take();
    }

    /// ACTIVE -> CLOSED. Returns false if it was already closed.
    fn mark_closed(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Dropping the sender lets the worker stop
        self.seal();
        self.cancel.notify_waiters();
        true
    }
}

/// Active subscriptions, indexed by `(target type, event kind)` for candidate
/// lookup.
///
/// Lookups clone the candidate list out of the index, so no lock is held
/// while an event is filtered, built or delivered.
pub struct SubscriptionRegistry {
    by_handle: DashMap<SubscriptionHandle, Arc<Subscription>>,
    index: DashMap<(String, EventKind), Vec<Arc<Subscription>>>,
    stats: Arc<EngineStats>,
}

impl SubscriptionRegistry {
    pub fn new(stats: Arc<EngineStats>) -> Self {
        Self {
            by_handle: DashMap::new(),
            index: DashMap::new(),
            stats,
        }
    }

    pub(crate) fn insert(&self, subscription: Arc<Subscription>) {
        let key = (
            subscription.target_type.clone(),
            subscription.operation.event_kind(),
        );
        self.index
            .entry(key)
            .or_default()
            .push(Arc::clone(&subscription));
        info!(
            "Subscription {} registered: {} on {}",
            subscription.handle, subscription.operation, subscription.target_type
        );
        self.by_handle.insert(subscription.handle, subscription);
    }

    /// Active subscriptions listening for `kind` on `type_name`
    pub fn candidates(&self, type_name: &str, kind: EventKind) -> Vec<Arc<Subscription>> {
        self.index
            .get(&(type_name.to_string(), kind))
            .map(|entry| {
                entry
                    .iter()
                    .filter(|subscription| !subscription.is_closed())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get(&self, handle: SubscriptionHandle) -> Option<Arc<Subscription>> {
        self.by_handle.get(&handle).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    pub fn handles(&self) -> Vec<SubscriptionHandle> {
        self.by_handle.iter().map(|entry| *entry.key()).collect()
    }

    /// Close a subscription.
    ///
    /// A delivery still waiting on the client is abandoned. Returns once no
    /// delivery to it is in flight; nothing is delivered to it afterwards.
    /// Returns false if it was not active.
    pub async fn close(&self, handle: SubscriptionHandle) -> bool {
        let Some(subscription) = self.detach(handle) else {
            return false;
        };
        Self::finish_close(subscription).await;
        true
    }

    /// Second half of [`close`](Self::close) for an already detached
    /// subscription
    pub(crate) async fn finish_close(subscription: Arc<Subscription>) {
        // Waits out a delivery that started before the flag flipped; a
        // cancelled one releases the lock at once
        drop(subscription.delivery.lock().await);
        subscription.transport.closed(subscription.handle).await;
        info!("Subscription {} closed", subscription.handle);
    }

    /// Flip the subscription to CLOSED and drop it from the index without
    /// waiting for in-flight deliveries
    pub(crate) fn detach(&self, handle: SubscriptionHandle) -> Option<Arc<Subscription>> {
        let (_, subscription) = self.by_handle.remove(&handle)?;
        if !subscription.mark_closed() {
            return None;
        }

        let key = (
            subscription.target_type.clone(),
            subscription.operation.event_kind(),
        );
        let now_empty = match self.index.get_mut(&key) {
            Some(mut entry) => {
                entry.retain(|s| s.handle != handle);
                entry.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.index.remove_if(&key, |_, entries| entries.is_empty());
        }

        self.stats.record_closed();
        debug!("Subscription {} detached", handle);
        Some(subscription)
    }
}
