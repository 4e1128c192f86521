//! Shared test utilities: arbitrary generators for property-based testing
//! and an inner-transport double that records what it is asked to send.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::envelope::{Envelope, EnvelopeItem, EventId};
use crate::transport::{InnerTransport, SendError};

pub fn arb_event_id() -> impl Strategy<Value = EventId> {
    "[0-9a-f]{32}".prop_map(|s| EventId::parse(s).unwrap())
}

pub fn arb_item_type() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,11}".prop_map(String::from)
}

pub fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..200)
}

pub fn arb_envelope_item() -> impl Strategy<Value = EnvelopeItem> {
    (arb_item_type(), arb_payload())
        .prop_map(|(item_type, payload)| EnvelopeItem::new(item_type, payload))
}

pub fn arb_envelope() -> impl Strategy<Value = Envelope> {
    (
        prop::option::of(arb_event_id()),
        prop::collection::vec(arb_envelope_item(), 0..4),
    )
        .prop_map(|(event_id, items)| {
            let mut envelope = match event_id {
                Some(id) => Envelope::with_event_id(id),
                None => Envelope::new(),
            };
            for item in items {
                envelope = envelope.add_item(item);
            }
            envelope
        })
}

/// How [`RecordingTransport`] responds to sends.
#[derive(Debug, Clone, Copy)]
pub enum SendMode {
    /// Record the envelope and succeed immediately.
    Succeed,

    /// Record the envelope and succeed after the delay; cancellation
    /// preempts the delay.
    Delay(Duration),

    /// Park until the cancellation token fires, then report cancellation.
    Block,

    /// Fail with a network-unreachable error.
    NetworkError,

    /// Fail with a permanent rejection.
    Reject,

    /// Reject the next send, then behave like [`SendMode::Succeed`].
    RejectOnce,
}

/// Inner transport double recording envelopes and call counts.
pub struct RecordingTransport {
    mode: Mutex<SendMode>,
    sent: Mutex<Vec<Envelope>>,
    calls: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        RecordingTransport::with_mode(SendMode::Succeed)
    }

    pub fn with_mode(mode: SendMode) -> Self {
        RecordingTransport {
            mode: Mutex::new(mode),
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: SendMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Envelopes successfully sent, in delivery order.
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Total send attempts, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        RecordingTransport::new()
    }
}

#[async_trait]
impl InnerTransport for RecordingTransport {
    async fn send(&self, envelope: Envelope, cancel: &CancellationToken) -> Result<(), SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock().unwrap();
        match mode {
            SendMode::Succeed => {
                self.sent.lock().unwrap().push(envelope);
                Ok(())
            }
            SendMode::Delay(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        self.sent.lock().unwrap().push(envelope);
                        Ok(())
                    }
                    _ = cancel.cancelled() => Err(SendError::cancelled()),
                }
            }
            SendMode::Block => {
                cancel.cancelled().await;
                Err(SendError::cancelled())
            }
            SendMode::NetworkError => Err(SendError::network("connection refused")),
            SendMode::Reject => Err(SendError::rejected("envelope rejected by server")),
            SendMode::RejectOnce => {
                self.set_mode(SendMode::Succeed);
                Err(SendError::rejected("envelope rejected by server"))
            }
        }
    }
}
