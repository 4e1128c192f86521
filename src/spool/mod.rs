//! Durable on-disk spool for outbound envelopes.
//!
//! The spool is a crash-safe FIFO on the filesystem. Each envelope lives in
//! its own file under a per-DSN isolated root:
//!
//! ```text
//! <cache_root>/Sentry/<dsn_slug>/
//!     1700000000_b2495755f67e4bb8a75504e5ce91d6c1_17754019.envelope
//!     1700000001__17754019.envelope        # no event id
//!     __processing/
//!         1699999950_..._81236674.envelope  # being sent
//! ```
//!
//! A file is either directly under the root (ready to send) or under
//! `__processing` (claimed by a sender), never both. On startup,
//! `__processing` is drained back to the root so envelopes whose send was
//! interrupted by a crash re-enter the ready set.
//!
//! # Crash safety
//!
//! - Envelope files are written with exclusive creation, then fsynced along
//!   with their directory before the write is acknowledged.
//! - Claiming moves a file into `__processing` with an atomic rename.
//! - Recovery is a rename back; running it twice is equivalent to running
//!   it once.

mod directory;
mod layout;

pub use directory::{Result, SpoolDirectory, SpoolError};
pub use layout::{ENVELOPE_EXTENSION, PROCESSING_DIR_NAME, SpoolFileName, SpoolLayout};
