//! Error taxonomy of the transport layer.
//!
//! Producers calling [`send`](super::CachingTransport::send) only ever see
//! [`TransportError::Cancelled`] or [`TransportError::Storage`]; failures of
//! the inner transport are handled by the background worker and surface to
//! operators through logging. The [`TransportError::Send`] variant exists
//! for the pass-through transport (spooling disabled) and for flush callers,
//! which talk to the wire directly.

use thiserror::Error;

use crate::spool::SpoolError;
use crate::sync::Cancelled;

use super::inner::{SendError, SendErrorKind};

/// Errors surfaced by the public transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport was constructed with unusable options.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// A cancellation token fired before the operation completed.
    #[error("transport operation cancelled")]
    Cancelled,

    /// The spool could not be read or written.
    #[error("spool storage failure")]
    Storage(#[source] SpoolError),

    /// The inner transport failed to deliver an envelope.
    #[error("envelope delivery failed")]
    Send(#[source] SendError),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

impl From<Cancelled> for TransportError {
    fn from(_: Cancelled) -> Self {
        TransportError::Cancelled
    }
}

impl From<SpoolError> for TransportError {
    fn from(err: SpoolError) -> Self {
        match err {
            SpoolError::Cancelled => TransportError::Cancelled,
            other => TransportError::Storage(other),
        }
    }
}

impl From<SendError> for TransportError {
    fn from(err: SendError) -> Self {
        match err.kind() {
            SendErrorKind::Cancelled => TransportError::Cancelled,
            _ => TransportError::Send(err),
        }
    }
}
