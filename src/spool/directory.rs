//! Filesystem operations over one DSN's spool.
//!
//! All operations here are synchronous; callers provide concurrency control
//! through [`SpoolLock`](crate::sync::SpoolLock). The durability-critical
//! paths (store, claim, reclaim) fsync both the file and the containing
//! directory: on POSIX systems a created or renamed file is only durable
//! once its directory entry is, and a crash between the two can otherwise
//! lose or resurrect entries.
//!
//! # Ordering
//!
//! Ready files are ordered by filesystem creation time ascending, falling
//! back to modification time where creation time is unavailable, with ties
//! broken by file name. The fallback is consistent within a run, which is
//! all the FIFO contract requires.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::envelope::Envelope;

use super::layout::{ENVELOPE_EXTENSION, SpoolFileName, SpoolLayout};

/// Errors that can occur during spool directory operations.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// An envelope with the same creation second, event id, and content
    /// hash is already spooled.
    #[error("duplicate spool file name: {0}")]
    Duplicate(String),

    /// The operation was cancelled before touching the filesystem.
    #[error("spool operation cancelled")]
    Cancelled,
}

/// Result type for spool directory operations.
pub type Result<T> = std::result::Result<T, SpoolError>;

/// Filesystem operations over an isolated spool root and its
/// `__processing` child.
#[derive(Debug)]
pub struct SpoolDirectory {
    layout: SpoolLayout,
}

impl SpoolDirectory {
    /// Creates a directory handle. No filesystem access happens here;
    /// directories are created lazily by the operations that need them.
    pub fn new(layout: SpoolLayout) -> Self {
        SpoolDirectory { layout }
    }

    /// Returns the layout this directory operates on.
    pub fn layout(&self) -> &SpoolLayout {
        &self.layout
    }

    /// Lists every ready envelope file, oldest first.
    ///
    /// A missing root is not an error and yields an empty list.
    pub fn list_ready(&self) -> Result<Vec<PathBuf>> {
        list_envelopes(self.layout.root())
    }

    /// Lists every envelope file under `__processing`, oldest first.
    pub fn list_processing(&self) -> Result<Vec<PathBuf>> {
        list_envelopes(self.layout.processing())
    }

    /// Moves every file in `__processing` back to the root, keeping names.
    ///
    /// Called once at transport construction to recover envelopes whose
    /// send was interrupted by a crash or shutdown. Idempotent: a second
    /// run finds `__processing` empty and does nothing.
    pub fn reclaim_processing(&self) -> Result<usize> {
        let processing = self.layout.processing();
        if !processing.exists() {
            return Ok(0);
        }

        let root = self.layout.root();
        fs::create_dir_all(root)?;

        let mut reclaimed = 0;
        for path in self.list_processing()? {
            let Some(name) = path.file_name() else {
                continue;
            };
            fs::rename(&path, root.join(name))?;
            reclaimed += 1;
        }

        if reclaimed > 0 {
            fsync_dir(processing)?;
            fsync_dir(root)?;
            debug!(reclaimed, "Restored interrupted envelopes to the ready set");
        }
        Ok(reclaimed)
    }

    /// Takes the oldest ready envelope and moves it under `__processing`.
    ///
    /// Must be called under the spool lock. Once moved, the file is owned
    /// by the caller until it deletes the file or the next startup reclaims
    /// it; no lock is needed for operations on the returned path.
    ///
    /// Returns `None` when the ready set is empty.
    pub fn claim_oldest(&self) -> Result<Option<PathBuf>> {
        let Some(oldest) = self.list_ready()?.into_iter().next() else {
            return Ok(None);
        };
        let Some(name) = oldest.file_name() else {
            return Ok(None);
        };

        let processing = self.layout.processing();
        fs::create_dir_all(processing)?;

        let claimed = processing.join(name);
        fs::rename(&oldest, &claimed)?;
        fsync_dir(self.layout.root())?;
        fsync_dir(processing)?;
        Ok(Some(claimed))
    }

    /// Deletes all but the newest `keep` ready envelopes, oldest first.
    ///
    /// `keep == 0` clears the ready set. Files already removed by a
    /// concurrent actor are tolerated silently. Returns the number of
    /// files evicted.
    pub fn evict_excess(&self, keep: usize) -> Result<usize> {
        let ready = self.list_ready()?;
        if ready.len() <= keep {
            return Ok(0);
        }

        let excess = ready.len() - keep;
        let mut evicted = 0;
        for path in ready.into_iter().take(excess) {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "Evicted oldest spooled envelope");
                    evicted += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if evicted > 0 {
            fsync_dir(self.layout.root())?;
        }
        Ok(evicted)
    }

    /// Writes an envelope to a new, uniquely named ready file.
    ///
    /// The file is created exclusively: two envelopes producing the same
    /// name within the same second fail with [`SpoolError::Duplicate`]
    /// rather than overwriting each other. The file and its directory are
    /// fsynced before the path is returned, so a `store` that returns has
    /// put the envelope on stable storage.
    pub fn store(&self, envelope: &Envelope, cancel: &CancellationToken) -> Result<PathBuf> {
        if cancel.is_cancelled() {
            return Err(SpoolError::Cancelled);
        }

        let root = self.layout.root();
        let root_existed = root.exists();
        fs::create_dir_all(root)?;
        if !root_existed && let Some(parent) = root.parent() {
            fsync_dir(parent)?;
        }

        let name = SpoolFileName::for_envelope(envelope, Utc::now()).file_name();
        let path = root.join(&name);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(SpoolError::Duplicate(name));
            }
            Err(e) => return Err(e.into()),
        };

        envelope.serialize(&mut file)?;
        file.sync_all()?;
        drop(file);
        fsync_dir(root)?;

        Ok(path)
    }

    /// Number of ready envelopes. Advisory: an unreadable root counts as
    /// zero and the value may be stale by the time the caller sees it.
    pub fn ready_count(&self) -> usize {
        self.list_ready().map(|files| files.len()).unwrap_or(0)
    }
}

/// Lists `*.envelope` files in `dir`, ordered by creation time ascending
/// with ties broken by file name. A missing directory yields an empty list.
fn list_envelopes(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files: Vec<(SystemTime, OsString, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path
            .extension()
            .is_some_and(|ext| ext == ENVELOPE_EXTENSION)
        {
            continue;
        }
        let metadata = entry.metadata()?;
        let created = metadata.created().or_else(|_| metadata.modified())?;
        files.push((created, entry.file_name(), path));
    }

    files.sort();
    Ok(files.into_iter().map(|(_, _, path)| path).collect())
}

/// Syncs a directory so its entries survive a power loss.
fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}
