//! The transport layer: durable spooling in front of the wire.
//!
//! ```text
//! producer ──send──► CachingTransport ──store──► spool (disk)
//!                         │ release                  │
//!                         ▼                          │ claim
//!                    background worker ◄─────────────┘
//!                         │
//!                         ▼
//!                    InnerTransport ──► ingestion endpoint
//! ```
//!
//! Producers are acknowledged once their envelope is on stable storage;
//! delivery happens asynchronously from a single background worker per
//! transport. [`build_transport`] composes the pieces according to
//! [`TransportOptions`](crate::options::TransportOptions).

mod caching;
mod compose;
mod error;
mod inner;

pub use caching::CachingTransport;
pub use compose::{Transport, build_transport};
pub use error::{Result, TransportError};
pub use inner::{InnerTransport, SendError, SendErrorKind};
