//! Persisted result caches.
//!
//! Finished feature results are kept in the key-value store so a page that
//! was already summarized or scored can be shown instantly, and so a saved
//! result can stand in when every capability fails.
//!
//! - [`ResultCache`]: generic TTL + capacity bounded list under one store key.
//! - [`CalmSummaryEntry`]: calm summaries keyed on page URL.
//! - [`UsefulnessEntry`]: assessments keyed on page URL and intent.
//!
//! Each cache is configured with a [`CacheConfig`]; the two presets match
//! the limits the companion ships with.

mod entry;
mod result;

pub use entry::{CacheKey, CacheRecord, CalmSummaryEntry, UsefulnessEntry};
pub use result::ResultCache;

use std::time::Duration;

/// Capacity and TTL for one [`ResultCache`].
///
/// ```rust
/// # use mindful::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(50)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of stored entries. Default: 20.
    pub max_entries: usize,
    /// Entries older than this are purged on read. Default: 30 minutes.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 20,
            ttl: Duration::from_secs(30 * 60),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calm summaries: 12 entries, 1 hour.
    pub fn calm_summary() -> Self {
        Self::new().max_entries(12).ttl(Duration::from_secs(60 * 60))
    }

    /// Usefulness assessments: 20 entries, 30 minutes.
    pub fn usefulness() -> Self {
        Self::new().max_entries(20).ttl(Duration::from_secs(30 * 60))
    }

    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}
