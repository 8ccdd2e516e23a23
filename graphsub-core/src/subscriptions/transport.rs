use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::SubscriptionHandle;
use crate::errors::TransportError;

/// Outbound side of a client connection.
///
/// One transport may carry many subscriptions; the handle says which one a
/// payload belongs to. A delivery error closes that subscription only.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, handle: SubscriptionHandle, payload: Value) -> Result<(), TransportError>;

    /// Called once when a subscription on this transport is closed, whatever
    /// the reason
    async fn closed(&self, _handle: SubscriptionHandle) {}
}

/// Transport backed by a bounded channel; the receiving half is the
/// client's stream of payloads.
///
/// Dropping the receiver is how the client disconnects: the next delivery
/// fails with [`TransportError::Closed`] and the subscription is removed.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: mpsc::Sender<(SubscriptionHandle, Value)>,
}

impl ChannelTransport {
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<(SubscriptionHandle, Value)>) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn deliver(&self, handle: SubscriptionHandle, payload: Value) -> Result<(), TransportError> {
        self.sender
            .send((handle, payload))
            .await
            .map_err(|_| TransportError::Closed)
    }
}
