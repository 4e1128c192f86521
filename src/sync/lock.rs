//! Cancellable mutual exclusion over the spool directory.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use super::Cancelled;

/// Async mutex guarding spool-directory mutations.
///
/// One holder at a time; fairness among waiters is not guaranteed. Every
/// "list then act" sequence on the spool directory must run under a claim
/// from this lock.
#[derive(Debug, Clone, Default)]
pub struct SpoolLock {
    inner: Arc<Mutex<()>>,
}

/// An acquired claim on the spool directory, released on drop.
#[derive(Debug)]
#[must_use = "the claim releases the lock when dropped"]
pub struct SpoolClaim {
    _guard: OwnedMutexGuard<()>,
}

impl SpoolLock {
    /// Creates a new, unheld lock.
    pub fn new() -> Self {
        SpoolLock::default()
    }

    /// Acquires the lock, waiting until the current holder releases it.
    ///
    /// Returns [`Cancelled`] if `cancel` fires before acquisition; in that
    /// case no claim is taken and no cleanup is needed.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<SpoolClaim, Cancelled> {
        tokio::select! {
            guard = Arc::clone(&self.inner).lock_owned() => Ok(SpoolClaim { _guard: guard }),
            _ = cancel.cancelled() => Err(Cancelled),
        }
    }
}
