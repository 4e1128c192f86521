//! The envelope value type carried by the transport.
//!
//! An envelope is the unit of telemetry handed to a transport: an optional
//! event id plus a sequence of typed items (an error event, breadcrumbs, a
//! log batch). The transport treats the payload bytes as opaque; the only
//! structure it relies on is the serialization being byte-exact under
//! round-trip and the two metadata accessors ([`Envelope::event_id`] and
//! [`Envelope::content_hash`]) used to derive spool file names.
//!
//! # Wire format
//!
//! Newline-delimited: one JSON envelope header line, then for each item a
//! JSON item header line (`type` and payload `length`) followed by exactly
//! `length` raw payload bytes and a terminating newline.
//!
//! ```text
//! {"event_id":"b2495755f67e4bb8a75504e5ce91d6c1"}
//! {"type":"event","length":13}
//! {"level":"error"}
//! ```

use std::fmt;
use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::fnv1a_64;

/// Error returned when parsing an invalid event id.
#[derive(Debug, Clone, Error)]
#[error("invalid event id: expected 32 hex characters, got {len}: {preview}")]
pub struct InvalidEventId {
    len: usize,
    preview: String,
}

/// A telemetry event identifier: 32 lowercase hex characters, no dashes.
///
/// Construction is only possible via [`EventId::parse`], which normalizes
/// dashed/uppercase UUID spellings and validates the result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Parses an event id, accepting dashed and uppercase UUID forms.
    pub fn parse(s: impl AsRef<str>) -> std::result::Result<Self, InvalidEventId> {
        let raw = s.as_ref();
        let normalized: String = raw
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if normalized.len() == 32 && normalized.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(EventId(normalized))
        } else {
            Err(InvalidEventId {
                len: normalized.len(),
                preview: raw.chars().take(40).collect(),
            })
        }
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EventId::parse(s).map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur while decoding an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// IO error while reading or writing.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A header line was not valid JSON.
    #[error("malformed envelope header: {0}")]
    Header(#[from] serde_json::Error),

    /// The input ended before the envelope header line.
    #[error("envelope is empty (missing header line)")]
    MissingHeader,

    /// An item payload ended before its declared length.
    #[error("item payload truncated: expected {0} bytes")]
    TruncatedItem(u64),

    /// An item payload was not followed by a newline.
    #[error("expected newline after item payload")]
    MissingItemTerminator,
}

/// Result type for envelope operations.
pub type Result<T> = std::result::Result<T, EnvelopeError>;

#[derive(Debug, Serialize, Deserialize)]
struct EnvelopeHeader {
    #[serde(skip_serializing_if = "Option::is_none")]
    event_id: Option<EventId>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ItemHeader {
    #[serde(rename = "type")]
    item_type: String,
    length: u64,
}

/// A single typed item inside an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeItem {
    /// Item type tag, e.g. `event`, `attachment`, `log`.
    pub item_type: String,

    /// Raw payload bytes. The transport never inspects these.
    pub payload: Vec<u8>,
}

impl EnvelopeItem {
    /// Creates a new item with the given type tag and payload.
    pub fn new(item_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        EnvelopeItem {
            item_type: item_type.into(),
            payload: payload.into(),
        }
    }
}

/// A serializable unit of telemetry passed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    event_id: Option<EventId>,
    items: Vec<EnvelopeItem>,
}

impl Envelope {
    /// Creates an empty envelope without an event id.
    pub fn new() -> Self {
        Envelope::default()
    }

    /// Creates an empty envelope carrying the given event id.
    pub fn with_event_id(event_id: EventId) -> Self {
        Envelope {
            event_id: Some(event_id),
            items: Vec::new(),
        }
    }

    /// Appends an item, returning the envelope for chaining.
    pub fn add_item(mut self, item: EnvelopeItem) -> Self {
        self.items.push(item);
        self
    }

    /// Returns the event id, if the envelope carries one.
    pub fn event_id(&self) -> Option<&EventId> {
        self.event_id.as_ref()
    }

    /// Returns the envelope's items in order.
    pub fn items(&self) -> &[EnvelopeItem] {
        &self.items
    }

    /// Writes the envelope in its wire format.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let header = EnvelopeHeader {
            event_id: self.event_id.clone(),
        };
        serde_json::to_writer(&mut *writer, &header)?;
        writer.write_all(b"\n")?;

        for item in &self.items {
            let item_header = ItemHeader {
                item_type: item.item_type.clone(),
                length: item.payload.len() as u64,
            };
            serde_json::to_writer(&mut *writer, &item_header)?;
            writer.write_all(b"\n")?;
            writer.write_all(&item.payload)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Serializes the envelope to an owned byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.serialize(&mut bytes)
            .expect("writing to a Vec<u8> cannot fail");
        bytes
    }

    /// Reads an envelope from its wire format.
    ///
    /// This is the exact inverse of [`Envelope::serialize`]: the terminating
    /// newline after the final payload may be absent, but every other byte
    /// is significant.
    pub fn deserialize<R: BufRead>(reader: &mut R) -> Result<Self> {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(EnvelopeError::MissingHeader);
        }
        let header: EnvelopeHeader = serde_json::from_str(line.trim_end_matches('\n'))?;

        let mut items = Vec::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            let trimmed = line.trim_end_matches('\n');
            if trimmed.is_empty() {
                continue;
            }
            let item_header: ItemHeader = serde_json::from_str(trimmed)?;

            let mut payload = vec![0u8; item_header.length as usize];
            reader.read_exact(&mut payload).map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    EnvelopeError::TruncatedItem(item_header.length)
                } else {
                    EnvelopeError::Io(e)
                }
            })?;

            // Consume the newline terminating the payload, tolerating EOF
            // directly after the final item.
            let mut terminator = [0u8; 1];
            match reader.read(&mut terminator)? {
                0 => {}
                _ if terminator[0] == b'\n' => {}
                _ => return Err(EnvelopeError::MissingItemTerminator),
            }

            items.push(EnvelopeItem {
                item_type: item_header.item_type,
                payload,
            });
        }

        Ok(Envelope {
            event_id: header.event_id,
            items,
        })
    }

    /// Reads an envelope from a byte slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        Envelope::deserialize(&mut reader)
    }

    /// Returns an arithmetic hash of the serialized envelope.
    ///
    /// Used for uniqueness within a spool file name, not for integrity.
    pub fn content_hash(&self) -> i64 {
        fnv1a_64(&self.to_bytes()) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{arb_envelope, arb_event_id};
    use proptest::prelude::*;

    proptest! {
        /// Serialization round-trips byte-exactly through deserialize.
        #[test]
        fn serialize_roundtrip(envelope in arb_envelope()) {
            let bytes = envelope.to_bytes();
            let decoded = Envelope::from_slice(&bytes).unwrap();
            prop_assert_eq!(&envelope, &decoded);
            prop_assert_eq!(bytes, decoded.to_bytes());
        }

        /// The content hash is a pure function of the envelope.
        #[test]
        fn content_hash_is_deterministic(envelope in arb_envelope()) {
            prop_assert_eq!(envelope.content_hash(), envelope.clone().content_hash());
        }

        /// Event ids survive serde and keep their normalized form.
        #[test]
        fn event_id_serde_roundtrip(id in arb_event_id()) {
            let json = serde_json::to_string(&id).unwrap();
            let parsed: EventId = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(id, parsed);
        }

        /// Dashed and uppercase UUID spellings normalize to the same id.
        #[test]
        fn event_id_normalizes(hex in "[0-9a-f]{32}") {
            let dashed = format!(
                "{}-{}-{}-{}-{}",
                &hex[..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..]
            );
            let upper = hex.to_ascii_uppercase();
            let canonical = EventId::parse(&hex).unwrap();
            prop_assert_eq!(&canonical, &EventId::parse(&dashed).unwrap());
            prop_assert_eq!(&canonical, &EventId::parse(&upper).unwrap());
            prop_assert_eq!(canonical.as_str(), hex.as_str());
        }
    }

    #[test]
    fn event_id_rejects_bad_input() {
        assert!(EventId::parse("").is_err());
        assert!(EventId::parse("abc").is_err());
        assert!(EventId::parse("g".repeat(32)).is_err());
        assert!(EventId::parse("a".repeat(33)).is_err());
    }

    #[test]
    fn empty_envelope_serializes_to_bare_header() {
        let envelope = Envelope::new();
        assert_eq!(envelope.to_bytes(), b"{}\n");
    }

    #[test]
    fn payload_bytes_may_contain_newlines() {
        let envelope = Envelope::new().add_item(EnvelopeItem::new("attachment", b"a\nb\nc".to_vec()));
        let decoded = Envelope::from_slice(&envelope.to_bytes()).unwrap();
        assert_eq!(decoded.items()[0].payload, b"a\nb\nc");
    }

    #[test]
    fn deserialize_rejects_empty_input() {
        assert!(matches!(
            Envelope::from_slice(b""),
            Err(EnvelopeError::MissingHeader)
        ));
    }

    #[test]
    fn deserialize_rejects_truncated_payload() {
        let bytes = b"{}\n{\"type\":\"event\",\"length\":10}\nabc";
        assert!(matches!(
            Envelope::from_slice(bytes),
            Err(EnvelopeError::TruncatedItem(10))
        ));
    }

    #[test]
    fn deserialize_rejects_garbage_header() {
        assert!(matches!(
            Envelope::from_slice(b"not json\n"),
            Err(EnvelopeError::Header(_))
        ));
    }

    #[test]
    fn content_hash_differs_for_different_payloads() {
        let a = Envelope::new().add_item(EnvelopeItem::new("event", b"one".to_vec()));
        let b = Envelope::new().add_item(EnvelopeItem::new("event", b"two".to_vec()));
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
