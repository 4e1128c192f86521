//! Durable outbound envelope spool for a telemetry SDK.
//!
//! This crate implements the transport layer that sits between telemetry
//! producers and an ingestion endpoint. Envelopes handed to the transport
//! are persisted to a per-DSN spool directory before the producer is
//! acknowledged; a single background worker forwards them to the inner
//! transport, recovering cleanly from crashes, enforcing a bounded on-disk
//! queue, and distinguishing transient network loss (retry after restart)
//! from permanent rejection (discard).
//!
//! Entry point: [`transport::build_transport`], configured through
//! [`options::TransportOptions`].

#[cfg(test)]
pub mod test_utils;

pub mod envelope;
mod hash;
pub mod options;
pub mod spool;
pub mod sync;
pub mod transport;
