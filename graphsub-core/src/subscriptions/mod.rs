//! Subscription registry, dispatcher and the transport seam
//!
//! ```text
//! emit(raw) ─► normalize ─► [dispatch queue] ─► dispatcher task
//!                                                  │ candidates by (type, kind)
//!                                                  │ filter ─► build payload
//!                                                  ├──► [queue 1] ──► worker ──► transport.deliver
//!                                                  └──► [queue N] ──► worker ──► transport.deliver
//! ```
//!
//! - One dispatcher task keeps emission order; each subscription queue is FIFO.
//! - Handoff to a subscription queue never blocks; a slow subscriber only
//!   fills its own queue.
//! - A transport error closes that one subscription.

mod dispatcher;
mod operation;
mod registry;
mod stats;
mod transport;

pub(crate) use dispatcher::{spawn_worker, DispatchCommand, Dispatcher};
pub(crate) use registry::NewSubscription;

pub use operation::Operation;
pub use registry::{Enqueued, Subscription, SubscriptionRegistry, SubscriptionState};
pub use stats::{EngineStats, StatsSnapshot};
pub use transport::{ChannelTransport, Transport};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::selection::SelectionSet;

/// Opaque id of one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionHandle(Uuid);

impl SubscriptionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything needed to accept a subscription
#[derive(Debug, Clone)]
pub struct SubscriptionRequest {
    pub target_type: String,
    pub operation: Operation,
    /// The `where` argument as JSON; `null` means no filter
    pub where_arg: Value,
    pub selection: SelectionSet,
    /// Top-level payload key; defaults to the root field name
    pub response_key: Option<String>,
}

impl SubscriptionRequest {
    pub fn new(target_type: impl Into<String>, operation: Operation) -> Self {
        Self {
            target_type: target_type.into(),
            operation,
            where_arg: Value::Null,
            selection: SelectionSet::default(),
            response_key: None,
        }
    }

    pub fn with_where(mut self, where_arg: Value) -> Self {
        self.where_arg = where_arg;
        self
    }

    pub fn with_selection(mut self, selection: SelectionSet) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_response_key(mut self, key: impl Into<String>) -> Self {
        self.response_key = Some(key.into());
        self
    }
}
