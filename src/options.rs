//! Transport configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on the number of ready envelopes kept on disk.
pub const DEFAULT_MAX_QUEUE_ITEMS: usize = 30;

/// Default time budget for the startup flush.
pub const DEFAULT_CACHE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration consumed by the transport composer.
///
/// ```
/// use std::time::Duration;
/// use telemetry_spool::options::TransportOptions;
///
/// let options = TransportOptions::new()
///     .with_cache_root("/var/cache/app")
///     .with_dsn("https://key@ingest.example.com/42")
///     .with_max_queue_items(100)
///     .with_cache_flush_timeout(Duration::from_secs(2));
/// assert!(options.spooling_enabled());
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions {
    cache_root: Option<PathBuf>,
    dsn: Option<String>,
    max_queue_items: usize,
    cache_flush_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        TransportOptions {
            cache_root: None,
            dsn: None,
            max_queue_items: DEFAULT_MAX_QUEUE_ITEMS,
            cache_flush_timeout: DEFAULT_CACHE_FLUSH_TIMEOUT,
        }
    }
}

impl TransportOptions {
    /// Creates options with spooling disabled and default limits.
    pub fn new() -> Self {
        TransportOptions::default()
    }

    /// Sets the directory under which the spool lives. An empty or
    /// whitespace-only path leaves spooling disabled.
    pub fn with_cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(cache_root.into());
        self
    }

    /// Sets the DSN whose hash isolates this client's spool.
    pub fn with_dsn(mut self, dsn: impl Into<String>) -> Self {
        self.dsn = Some(dsn.into());
        self
    }

    /// Sets the bound on ready envelopes. Values below 1 mean the ready
    /// set is cleared before every write.
    pub fn with_max_queue_items(mut self, max_queue_items: usize) -> Self {
        self.max_queue_items = max_queue_items;
        self
    }

    /// Sets the startup flush budget. [`Duration::ZERO`] disables the
    /// startup flush.
    pub fn with_cache_flush_timeout(mut self, timeout: Duration) -> Self {
        self.cache_flush_timeout = timeout;
        self
    }

    /// The configured cache root, or `None` when unset, empty, or
    /// whitespace-only.
    pub fn cache_root(&self) -> Option<&Path> {
        self.cache_root
            .as_deref()
            .filter(|path| path.to_str().is_none_or(|s| !s.trim().is_empty()))
    }

    /// The configured DSN, if any.
    pub fn dsn(&self) -> Option<&str> {
        self.dsn.as_deref()
    }

    /// The bound on ready envelopes kept on disk.
    pub fn max_queue_items(&self) -> usize {
        self.max_queue_items
    }

    /// The startup flush budget.
    pub fn cache_flush_timeout(&self) -> Duration {
        self.cache_flush_timeout
    }

    /// Whether a usable cache root is configured.
    pub fn spooling_enabled(&self) -> bool {
        self.cache_root().is_some()
    }
}
