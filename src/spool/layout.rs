//! On-disk layout of the envelope spool.
//!
//! Every DSN gets an isolated root `<cache_root>/Sentry/<dsn_slug>` so two
//! clients pointed at different ingestion endpoints never share a queue.
//! Inside the root, ready envelopes sit directly as `*.envelope` files and
//! in-flight envelopes live under the `__processing` child directory.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::envelope::{Envelope, EventId};
use crate::hash::fnv1a_64;

/// Extension shared by every spooled envelope file.
pub const ENVELOPE_EXTENSION: &str = "envelope";

/// Name of the subdirectory holding envelopes currently being sent.
pub const PROCESSING_DIR_NAME: &str = "__processing";

/// Vendor directory inserted between the cache root and the DSN slug.
const VENDOR_DIR_NAME: &str = "Sentry";

/// Slug used when no DSN is configured.
const NO_DSN_SLUG: &str = "no-dsn";

/// Paths of one DSN's isolated spool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolLayout {
    root: PathBuf,
    processing: PathBuf,
}

impl SpoolLayout {
    /// Computes the isolated root for the given cache root and DSN.
    ///
    /// The DSN is reduced to a stable hex slug; the slug is deterministic
    /// across runs so restarts find the spool of previous sessions.
    pub fn new(cache_root: impl Into<PathBuf>, dsn: Option<&str>) -> Self {
        let slug = match dsn {
            Some(dsn) => format!("{:016x}", fnv1a_64(dsn.as_bytes())),
            None => NO_DSN_SLUG.to_string(),
        };
        let root = cache_root.into().join(VENDOR_DIR_NAME).join(slug);
        let processing = root.join(PROCESSING_DIR_NAME);
        SpoolLayout { root, processing }
    }

    /// The directory holding ready envelope files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory holding envelopes currently being sent.
    pub fn processing(&self) -> &Path {
        &self.processing
    }
}

/// The three fields encoded in a spool file name:
/// `<unix_seconds>_<event_id_or_empty>_<content_hash>.envelope`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolFileName {
    /// Creation time, UTC seconds since the Unix epoch.
    pub created_at: i64,

    /// Event id of the envelope, if known.
    pub event_id: Option<EventId>,

    /// Arithmetic hash of the envelope content.
    pub content_hash: i64,
}

impl SpoolFileName {
    /// Derives the file name fields for an envelope created at `created_at`.
    pub fn for_envelope(envelope: &Envelope, created_at: DateTime<Utc>) -> Self {
        SpoolFileName {
            created_at: created_at.timestamp(),
            event_id: envelope.event_id().cloned(),
            content_hash: envelope.content_hash(),
        }
    }

    /// Parses the fields back out of a file name.
    ///
    /// Returns `None` for files that do not follow the schema; the spool
    /// skips such files rather than failing on them.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{ENVELOPE_EXTENSION}"))?;
        let mut fields = stem.split('_');
        let created_at = fields.next()?.parse().ok()?;
        let event_id = match fields.next()? {
            "" => None,
            id => Some(EventId::parse(id).ok()?),
        };
        let content_hash = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(SpoolFileName {
            created_at,
            event_id,
            content_hash,
        })
    }

    /// Renders the file name, extension included.
    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SpoolFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let event_id = self.event_id.as_ref().map(EventId::as_str).unwrap_or("");
        write!(
            f,
            "{}_{}_{}.{}",
            self.created_at, event_id, self.content_hash, ENVELOPE_EXTENSION
        )
    }
}
