//! The caching transport: durable spooling in front of an inner transport.
//!
//! Producers call [`CachingTransport::send`], which persists the envelope
//! to the spool and returns as soon as the bytes are on stable storage; no
//! network I/O ever happens on the producer's path. A single background
//! worker drains the spool through the inner transport.
//!
//! # Worker loop
//!
//! ```text
//! loop:
//!     wait for the signal (consumes one release)
//!     drain: claim oldest -> decode -> inner.send -> delete
//! on cancellation:     stop
//! on any other error:  log, back off 500 ms, continue
//! ```
//!
//! A drain aborts on a network-unreachable failure and leaves the claimed
//! envelope under `__processing`; it is retried only after the next
//! transport construction reclaims it, not within the current session.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace};

use crate::envelope::{Envelope, EnvelopeError};
use crate::options::TransportOptions;
use crate::spool::{SpoolDirectory, SpoolError, SpoolLayout};
use crate::sync::{Cancelled, Signal, SpoolLock};

use super::error::{Result, TransportError};
use super::inner::{InnerTransport, SendError};

/// Delay before the worker retries after a failed drain.
const WORKER_ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// Why a drain stopped before emptying the ready set.
#[derive(Debug, Error)]
enum DrainError {
    #[error("drain cancelled")]
    Cancelled,

    #[error("inner transport unreachable")]
    Network(#[source] SendError),

    #[error("spool failure during drain")]
    Spool(#[from] SpoolError),
}

impl From<Cancelled> for DrainError {
    fn from(_: Cancelled) -> Self {
        DrainError::Cancelled
    }
}

impl From<DrainError> for TransportError {
    fn from(err: DrainError) -> Self {
        match err {
            DrainError::Cancelled => TransportError::Cancelled,
            DrainError::Network(e) => TransportError::Send(e),
            DrainError::Spool(e) => TransportError::from(e),
        }
    }
}

/// State shared between the public handle, the worker task, and flush.
struct TransportCore {
    inner: Arc<dyn InnerTransport>,
    directory: SpoolDirectory,
    lock: SpoolLock,
    signal: Signal,
    max_queue_items: usize,
}

/// Transport that persists envelopes to the spool before acknowledging the
/// producer, and forwards them from a background worker.
pub struct CachingTransport {
    core: Arc<TransportCore>,
    worker_cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for CachingTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingTransport").finish_non_exhaustive()
    }
}

impl CachingTransport {
    /// Builds the transport and spawns its background worker.
    ///
    /// Construction reclaims envelopes left under `__processing` by a
    /// previous session, then starts the worker with a pre-released signal
    /// so the leftovers are sent even if no new envelope ever arrives.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`TransportError::InvalidConfig`] when no usable `cache_root` is
    /// configured; [`TransportError::Storage`] when the reclaim of a
    /// previous session's files fails.
    pub fn new(inner: Arc<dyn InnerTransport>, options: &TransportOptions) -> Result<Self> {
        let Some(cache_root) = options.cache_root() else {
            return Err(TransportError::InvalidConfig(
                "cache_root must be a non-empty path".to_string(),
            ));
        };

        let layout = SpoolLayout::new(cache_root, options.dsn());
        let directory = SpoolDirectory::new(layout);
        directory.reclaim_processing().map_err(TransportError::from)?;

        let core = Arc::new(TransportCore {
            inner,
            directory,
            lock: SpoolLock::new(),
            signal: Signal::new(true),
            max_queue_items: options.max_queue_items(),
        });

        let worker_cancel = CancellationToken::new();
        let worker = tokio::spawn(worker_loop(Arc::clone(&core), worker_cancel.clone()));

        Ok(CachingTransport {
            core,
            worker_cancel,
            worker: Some(worker),
        })
    }

    /// Durably spools an envelope and wakes the worker.
    ///
    /// Returns once the envelope is on stable storage; never waits on the
    /// network. Eviction runs first, under the same lock claim as the
    /// write, so the ready set never exceeds `max_queue_items`.
    ///
    /// # Errors
    ///
    /// [`TransportError::Cancelled`] if `cancel` fires before the write,
    /// [`TransportError::Storage`] if the filesystem write fails. Inner
    /// transport failures are never surfaced here.
    #[instrument(skip(self, envelope, cancel), fields(event_id = envelope.event_id().map(tracing::field::display)))]
    pub async fn send(&self, envelope: &Envelope, cancel: &CancellationToken) -> Result<()> {
        let claim = self.core.lock.acquire(cancel).await?;
        let keep = self.core.max_queue_items.saturating_sub(1);
        self.core.directory.evict_excess(keep)?;
        let path = self.core.directory.store(envelope, cancel)?;
        drop(claim);

        self.core.signal.release();
        debug!(path = %path.display(), "Envelope spooled");
        Ok(())
    }

    /// Drains everything currently on disk through the inner transport.
    ///
    /// Runs the same drain routine as the worker, concurrently with it;
    /// the two are coordinated only by the spool lock and by claims moving
    /// files out of the ready set. Concurrent `send`s are not blocked, so
    /// a flush may deliver envelopes enqueued after it started.
    pub async fn flush(&self, cancel: &CancellationToken) -> Result<()> {
        process_cache(&self.core, cancel).await.map_err(Into::into)
    }

    /// Number of envelopes in the ready set. Advisory; may be stale.
    pub fn queue_length(&self) -> usize {
        self.core.directory.ready_count()
    }

    /// Stops the background worker and waits for it to finish.
    ///
    /// Cancellation is cooperative: an in-flight send observes the token
    /// and returns, and the worker is joined rather than abandoned.
    /// Failures during disposal are logged, never returned.
    pub async fn close(mut self) {
        debug!("Closing caching transport");
        self.worker_cancel.cancel();
        self.core.signal.dispose();

        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                error!(error = %e, "Spool worker task failed during shutdown");
            }
        }

        self.core.inner.close().await;
    }

    /// Blocking adapter over [`CachingTransport::close`] for non-async
    /// call sites. Must run on a multi-threaded Tokio runtime.
    pub fn close_blocking(self) {
        let handle = tokio::runtime::Handle::current();
        tokio::task::block_in_place(|| handle.block_on(self.close()));
    }
}

impl Drop for CachingTransport {
    fn drop(&mut self) {
        // Dropped without close(): the worker can still be cancelled, but
        // not joined from a synchronous context.
        if self.worker.is_some() {
            self.worker_cancel.cancel();
            self.core.signal.dispose();
            debug!("Caching transport dropped without close; worker cancelled, not joined");
        }
    }
}

/// Background worker: wait for a release, drain, repeat.
async fn worker_loop(core: Arc<TransportCore>, cancel: CancellationToken) {
    debug!("Spool worker started");
    loop {
        let result = async {
            core.signal.wait(&cancel).await?;
            process_cache(&core, &cancel).await
        }
        .await;

        match result {
            Ok(()) => {}
            Err(DrainError::Cancelled) => break,
            Err(e) => {
                error!(error = %e, "Spool drain failed; backing off");
                tokio::select! {
                    _ = tokio::time::sleep(WORKER_ERROR_BACKOFF) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        }
    }
    debug!("Spool worker stopped");
}

/// One drain pass: claim, decode, send, delete, until the ready set is
/// empty or the drain aborts.
async fn process_cache(core: &TransportCore, cancel: &CancellationToken) -> std::result::Result<(), DrainError> {
    loop {
        let claimed = {
            let _claim = core.lock.acquire(cancel).await?;
            core.directory.claim_oldest()?
        };
        let Some(path) = claimed else {
            return Ok(());
        };

        // The file handle is released before any further filesystem
        // operation on the path.
        let envelope = match read_envelope(&path) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Discarding undecodable spool file");
                remove_processing_file(&path);
                continue;
            }
        };

        match core.inner.send(envelope, cancel).await {
            Ok(()) => {
                trace!(path = %path.display(), "Envelope delivered");
                remove_sent_file(&path)?;
            }
            Err(e) if e.is_cancelled() || cancel.is_cancelled() => {
                // Stays claimed; the next construction reclaims it.
                return Err(DrainError::Cancelled);
            }
            Err(e) if e.is_network() => {
                // Stays claimed; retried after the next start.
                return Err(DrainError::Network(e));
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Envelope rejected; discarding");
                remove_processing_file(&path);
            }
        }
    }
}

fn read_envelope(path: &Path) -> std::result::Result<Envelope, EnvelopeError> {
    let bytes = std::fs::read(path)?;
    Envelope::from_slice(&bytes)
}

/// Removes a delivered envelope's processing file.
fn remove_sent_file(path: &Path) -> std::result::Result<(), DrainError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DrainError::Spool(SpoolError::Io(e))),
    }
}

/// Removes a discarded envelope's processing file, logging on failure.
fn remove_processing_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path)
        && e.kind() != io::ErrorKind::NotFound
    {
        error!(path = %path.display(), error = %e, "Failed to remove processing file");
    }
}
