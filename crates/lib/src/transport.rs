//! Request transport boundary.
//!
//! The transport owns the wire: it decodes one inbound request into a
//! payload, runs the adapter's [`RequestHandler`] on it, and delivers the
//! resulting [`Envelope`](crate::handler::Envelope) back to the requester.
//! Success and failure travel the same path — the envelope's `status` field
//! is the only discriminator the requester ever sees, and no raw error
//! crosses this boundary.

use async_trait::async_trait;
use thiserror::Error;

use crate::{Result, handler::RequestHandler};

/// Errors that can occur at the transport boundary.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TransportError {
    /// The inbound request could not be decoded into a payload.
    #[error("Failed to decode inbound request: {reason}")]
    DecodeFailed {
        /// Implementation-provided detail
        reason: String,
    },

    /// The result envelope could not be delivered back to the requester.
    #[error("Failed to deliver response: {reason}")]
    DeliveryFailed {
        /// Implementation-provided detail
        reason: String,
    },

    /// The transport's connection is closed.
    #[error("Transport is closed")]
    Closed,
}

impl TransportError {
    /// Check if this error occurred while decoding the inbound request.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, TransportError::DecodeFailed { .. })
    }
}

/// Asynchronous request transport consumed by the adapter.
///
/// One call handles one request end to end. Transport implementations are
/// free to loop, multiplex, or spawn — the adapter only requires that the
/// handler runs once per decoded payload and that the envelope it returns
/// reaches the requester.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Processes one inbound request with the given handler.
    async fn process_request(&self, handler: &RequestHandler) -> Result<()>;
}
