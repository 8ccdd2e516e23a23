use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde_json::Value;
use tracing::debug;

use super::parse_subscription;
use crate::engine::SubscriptionEngine;
use crate::errors::EngineResult;
use crate::subscriptions::{
    ChannelTransport, SubscriptionHandle, SubscriptionRegistry, SubscriptionRequest,
};

/// Payloads of one subscription as a `Stream`, for a GraphQL execution layer
/// to forward to its client.
///
/// Dropping the stream closes the subscription.
pub struct SubscriptionStream {
    handle: SubscriptionHandle,
    registry: Arc<SubscriptionRegistry>,
    inner: Pin<Box<dyn Stream<Item = Value> + Send>>,
}

impl SubscriptionStream {
    pub fn open(engine: &SubscriptionEngine, request: SubscriptionRequest) -> EngineResult<Self> {
        let (transport, mut receiver) = ChannelTransport::new(engine.config().queue_capacity);
        let handle = engine.subscribe(request, Arc::new(transport))?;

        let stream = async_stream::stream! {
            while let Some((_, payload)) = receiver.recv().await {
                yield payload;
            }
            debug!("Stream for subscription {} ended", handle);
        };

        Ok(Self {
            handle,
            registry: engine.shared_registry(),
            inner: Box::pin(stream),
        })
    }

    /// Parse `source` and open a stream on it
    pub fn from_document(
        engine: &SubscriptionEngine,
        source: &str,
        variables: &Value,
    ) -> EngineResult<Self> {
        let request = parse_subscription(engine.schema(), source, variables, None)?;
        Self::open(engine, request)
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }
}

impl Stream for SubscriptionStream {
    type Item = Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Value>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        let registry = Arc::clone(&self.registry);
        let handle = self.handle;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    registry.close(handle).await;
                });
            }
            // Without a runtime the next delivery fails and closes it instead
            Err(_) => debug!("Stream for subscription {} dropped outside a runtime", handle),
        }
    }
}
