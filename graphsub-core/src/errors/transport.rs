//! Delivery errors

use thiserror::Error;

/// Errors returned by a transport when handing over a payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Peer connection is gone
    #[error("Transport closed")]
    Closed,

    /// Transport refused the payload
    #[error("Transport rejected payload: {0}")]
    Rejected(String),
}
