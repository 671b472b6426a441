use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::storage::{CALM_SUMMARY_CACHE_KEY, USEFULNESS_CACHE_KEY};

/// Address of a cached result: the page plus, for intent-sensitive
/// features, the intent it was computed against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub url: String,
    pub intent: Option<String>,
}

impl CacheKey {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            intent: None,
        }
    }

    pub fn with_intent(url: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            intent: Some(intent.into()),
        }
    }
}

/// A record type storable in a [`ResultCache`](super::ResultCache).
pub trait CacheRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Store key the record list lives under.
    const STORE_KEY: &'static str;

    fn from_parts(key: CacheKey, payload: String, timestamp: i64) -> Self;

    fn key(&self) -> CacheKey;

    fn payload(&self) -> &str;

    /// Epoch milliseconds at which the record was written.
    fn timestamp(&self) -> i64;

    /// Records that deserialized but carry blank fields are dropped.
    fn is_well_formed(&self) -> bool {
        !self.key().url.is_empty() && !self.payload().trim().is_empty()
    }
}

/// Persisted calm summary: `{url, summary, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalmSummaryEntry {
    pub url: String,
    pub summary: String,
    pub timestamp: i64,
}

impl CacheRecord for CalmSummaryEntry {
    const STORE_KEY: &'static str = CALM_SUMMARY_CACHE_KEY;

    fn from_parts(key: CacheKey, payload: String, timestamp: i64) -> Self {
        Self {
            url: key.url,
            summary: payload,
            timestamp,
        }
    }

    fn key(&self) -> CacheKey {
        CacheKey::url(&self.url)
    }

    fn payload(&self) -> &str {
        &self.summary
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Persisted usefulness assessment: `{url, intent, assessment, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsefulnessEntry {
    pub url: String,
    pub intent: String,
    /// Canonical assessment text.
    pub assessment: String,
    pub timestamp: i64,
}

impl CacheRecord for UsefulnessEntry {
    const STORE_KEY: &'static str = USEFULNESS_CACHE_KEY;

    fn from_parts(key: CacheKey, payload: String, timestamp: i64) -> Self {
        Self {
            url: key.url,
            intent: key.intent.unwrap_or_default(),
            assessment: payload,
            timestamp,
        }
    }

    fn key(&self) -> CacheKey {
        CacheKey::with_intent(&self.url, &self.intent)
    }

    fn payload(&self) -> &str {
        &self.assessment
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn is_well_formed(&self) -> bool {
        !self.url.is_empty() && !self.intent.is_empty() && !self.assessment.trim().is_empty()
    }
}
