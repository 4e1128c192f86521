//! Concurrency primitives coordinating producers with the spool worker.
//!
//! - [`Signal`]: a single-slot, edge-triggered wakeup between producers and
//!   the background worker.
//! - [`SpoolLock`]: cancellable mutual exclusion over spool-directory
//!   mutations.
//!
//! Both primitives take a [`CancellationToken`] on every blocking operation
//! and resolve pending waits as [`Cancelled`] when it fires.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

mod lock;
mod signal;

use thiserror::Error;

pub use lock::{SpoolClaim, SpoolLock};
pub use signal::Signal;

/// A wait was interrupted by cancellation or disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;
