//! The seam to the component that actually ships envelopes over the wire.
//!
//! The spool does not know how envelopes reach the ingestion endpoint; it
//! drives an [`InnerTransport`] and classifies its failures. The
//! classification decides recovery:
//!
//! - **Cancelled** waits are not failures; the envelope stays claimed and is
//!   reclaimed on the next start.
//! - **NetworkUnreachable** is transient: the drain aborts and the envelope
//!   is retried after the next start.
//! - **Rejected** is permanent: the envelope is logged and discarded.

use std::fmt;
use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::envelope::Envelope;

/// The kind of send failure, categorized for recovery decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendErrorKind {
    /// The cancellation token fired while the send was in flight.
    Cancelled,

    /// The request never reached the endpoint: connection refused or reset,
    /// DNS failure, timeout. Safe to retry with the same envelope.
    NetworkUnreachable,

    /// The endpoint (or the request pipeline) rejected the envelope.
    /// Retrying the same payload would fail again.
    Rejected,
}

/// A failure reported by an [`InnerTransport`].
#[derive(Debug, Error)]
pub struct SendError {
    kind: SendErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SendErrorKind::Cancelled => write!(f, "send cancelled: {}", self.message),
            SendErrorKind::NetworkUnreachable => {
                write!(f, "network unreachable: {}", self.message)
            }
            SendErrorKind::Rejected => write!(f, "envelope rejected: {}", self.message),
        }
    }
}

impl SendError {
    /// A send interrupted by cancellation.
    pub fn cancelled() -> Self {
        SendError {
            kind: SendErrorKind::Cancelled,
            message: "cancellation token fired".to_string(),
            source: None,
        }
    }

    /// A transient, socket-level failure.
    pub fn network(message: impl Into<String>) -> Self {
        SendError {
            kind: SendErrorKind::NetworkUnreachable,
            message: message.into(),
            source: None,
        }
    }

    /// A permanent rejection.
    pub fn rejected(message: impl Into<String>) -> Self {
        SendError {
            kind: SendErrorKind::Rejected,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Categorizes an arbitrary failure from an HTTP client.
    ///
    /// The error's source chain is walked looking for a socket-level
    /// `io::Error`; if one is found the failure is transient
    /// ([`SendErrorKind::NetworkUnreachable`]), otherwise it is a permanent
    /// rejection. Clients with richer error types should construct the
    /// kind directly instead.
    pub fn classify(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        let kind = if chain_has_socket_error(source.as_ref()) {
            SendErrorKind::NetworkUnreachable
        } else {
            SendErrorKind::Rejected
        };
        SendError {
            kind,
            message: message.into(),
            source: Some(source),
        }
    }

    /// The failure category.
    pub fn kind(&self) -> SendErrorKind {
        self.kind
    }

    /// True for transient socket-level failures.
    pub fn is_network(&self) -> bool {
        self.kind == SendErrorKind::NetworkUnreachable
    }

    /// True when the send was interrupted by cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.kind == SendErrorKind::Cancelled
    }
}

/// Walks an error's source chain looking for a socket-level IO error.
fn chain_has_socket_error(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut cursor = Some(err);
    while let Some(err) = cursor {
        if let Some(io_err) = err.downcast_ref::<io::Error>()
            && is_socket_kind(io_err.kind())
        {
            return true;
        }
        cursor = err.source();
    }
    false
}

fn is_socket_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::NetworkDown
    )
}

/// Downstream component that performs the actual network transmission.
///
/// Implementations must honor `cancel` promptly: the spool worker relies on
/// in-flight sends observing cancellation for bounded-time shutdown.
#[async_trait]
pub trait InnerTransport: Send + Sync {
    /// Ships one envelope to the ingestion endpoint.
    async fn send(&self, envelope: Envelope, cancel: &CancellationToken) -> Result<(), SendError>;

    /// Releases resources held by the transport. Called once during
    /// disposal; the default does nothing.
    async fn close(&self) {}
}
