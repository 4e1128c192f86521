//! Edge-triggered wakeup signal between producers and the spool worker.

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::Cancelled;

/// A single-slot, edge-triggered notification.
///
/// The signal holds at most one pending release: releasing an already
/// released signal is a no-op, and a [`Signal::wait`] consumes the release
/// and rearms before returning. A release that races with an in-progress
/// wait is never lost; either the waiter is woken directly or the release
/// is stored for the next wait.
///
/// The design supports any number of releasers but a single logical waiter
/// (the background worker).
#[derive(Debug)]
pub struct Signal {
    notify: Notify,
    disposed: CancellationToken,
}

impl Signal {
    /// Creates a new signal.
    ///
    /// With `pre_released`, the first [`Signal::wait`] returns immediately.
    /// The transport uses this at startup so the worker drains envelopes
    /// left over from a previous session even if no new send arrives.
    pub fn new(pre_released: bool) -> Self {
        let notify = Notify::new();
        if pre_released {
            notify.notify_one();
        }
        Signal {
            notify,
            disposed: CancellationToken::new(),
        }
    }

    /// Releases the signal. Never blocks, never fails, idempotent while
    /// released.
    pub fn release(&self) {
        self.notify.notify_one();
    }

    /// Waits until the signal is released, consuming the release.
    ///
    /// Returns [`Cancelled`] if `cancel` fires first or the signal is
    /// disposed while waiting.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        tokio::select! {
            _ = self.notify.notified() => Ok(()),
            _ = cancel.cancelled() => Err(Cancelled),
            _ = self.disposed.cancelled() => Err(Cancelled),
        }
    }

    /// Disposes the signal: any pending or future wait resolves as
    /// cancelled. Idempotent.
    pub fn dispose(&self) {
        self.disposed.cancel();
    }
}
