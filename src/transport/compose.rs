//! Transport composition: spooled or pass-through, plus the startup flush.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::envelope::Envelope;
use crate::options::TransportOptions;

use super::caching::CachingTransport;
use super::error::{Result, TransportError};
use super::inner::InnerTransport;

/// The transport surface handed to the rest of the SDK.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Accepts one envelope for delivery.
    async fn send(&self, envelope: Envelope, cancel: &CancellationToken) -> Result<()>;

    /// Delivers everything the transport currently holds.
    async fn flush(&self, cancel: &CancellationToken) -> Result<()>;

    /// Number of envelopes waiting for delivery. Advisory.
    fn queue_length(&self) -> usize;

    /// Releases the transport's resources. Never fails.
    async fn close(self: Box<Self>);
}

#[async_trait]
impl Transport for CachingTransport {
    async fn send(&self, envelope: Envelope, cancel: &CancellationToken) -> Result<()> {
        CachingTransport::send(self, &envelope, cancel).await
    }

    async fn flush(&self, cancel: &CancellationToken) -> Result<()> {
        CachingTransport::flush(self, cancel).await
    }

    fn queue_length(&self) -> usize {
        CachingTransport::queue_length(self)
    }

    async fn close(self: Box<Self>) {
        CachingTransport::close(*self).await;
    }
}

/// Pass-through used when spooling is disabled: envelopes go straight to
/// the inner transport and its failures reach the caller.
struct DirectTransport {
    inner: Arc<dyn InnerTransport>,
}

#[async_trait]
impl Transport for DirectTransport {
    async fn send(&self, envelope: Envelope, cancel: &CancellationToken) -> Result<()> {
        self.inner
            .send(envelope, cancel)
            .await
            .map_err(TransportError::from)
    }

    async fn flush(&self, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }

    fn queue_length(&self) -> usize {
        0
    }

    async fn close(self: Box<Self>) {
        self.inner.close().await;
    }
}

/// Builds the transport described by `options`.
///
/// Without a usable `cache_root` the inner transport is returned as-is.
/// Otherwise it is wrapped in a [`CachingTransport`] and, when
/// `cache_flush_timeout` is non-zero, envelopes left over from previous
/// sessions are flushed before this returns, bounded by that timeout.
/// Flush failures are logged and never prevent construction.
pub async fn build_transport(
    inner: Arc<dyn InnerTransport>,
    options: &TransportOptions,
) -> Result<Box<dyn Transport>> {
    if !options.spooling_enabled() {
        debug!("No cache root configured; envelopes will not be spooled");
        return Ok(Box::new(DirectTransport { inner }));
    }

    let transport = CachingTransport::new(inner, options)?;

    let timeout = options.cache_flush_timeout();
    if !timeout.is_zero() {
        startup_flush(&transport, timeout).await;
    }

    Ok(Box::new(transport))
}

/// Runs the startup flush under a hard time budget.
async fn startup_flush(transport: &CachingTransport, timeout: Duration) {
    let flush_cancel = CancellationToken::new();
    let flush = transport.flush(&flush_cancel);
    tokio::pin!(flush);

    let result = tokio::select! {
        result = &mut flush => result,
        _ = tokio::time::sleep(timeout) => {
            // Cancel cooperatively and wait for the flush to observe it,
            // so no envelope is abandoned mid-send.
            flush_cancel.cancel();
            flush.await
        }
    };

    match result {
        Ok(()) => debug!("Startup flush drained the spool"),
        Err(TransportError::Cancelled) => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Startup flush timed out; remaining envelopes stay spooled"
            );
        }
        Err(e) => error!(error = %e, "Startup flush failed"),
    }
}
