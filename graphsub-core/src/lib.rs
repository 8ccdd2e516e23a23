//! Mutation-event capture and dispatch for GraphQL subscriptions over a
//! graph database.
//!
//! Raw mutation records enter through [`SubscriptionEngine::emit`], are
//! normalized into typed [`MutationEvent`]s and fanned out to every matching
//! subscription, each getting a payload shaped by its own selection set.

pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod filter;
pub mod payload;
pub mod schema;
pub mod selection;
pub mod subscriptions;

#[cfg(feature = "graphql")]
pub mod graphql;

#[cfg(feature = "graphql")]
pub mod replay;

#[cfg(test)]
mod test_fixtures;

pub use config::EngineConfig;
pub use engine::SubscriptionEngine;
pub use events::{MutationEvent, RawMutationRecord};
pub use schema::{SchemaMetadata, TypeRegistry};
pub use subscriptions::{Operation, SubscriptionHandle, SubscriptionRequest, Transport};
