//! GraphQL adapter
//!
//! Bridges the engine to a GraphQL execution layer: subscription documents
//! are parsed with `async_graphql::parser` into [`SubscriptionRequest`]s, and
//! delivered payloads come back out as a [`SubscriptionStream`].
//!
//! [`SubscriptionRequest`]: crate::subscriptions::SubscriptionRequest

mod document;
mod stream;

pub use document::parse_subscription;
pub use stream::SubscriptionStream;
