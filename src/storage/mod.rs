//! Durable key-value storage.
//!
//! Everything the companion persists (mode, intent, result caches, journal)
//! goes through the [`KeyValueStore`] trait. Values are JSON, mirroring the
//! extension storage area the data model was designed against.
//!
//! - [`MemoryStore`]: process-local, for tests and ephemeral sessions.
//! - [`FileStore`]: one JSON object file on disk, atomic writes.
//!
//! Writes are last-writer-wins; there are no cross-process transactions.

mod clock;
mod file;
mod settings;

pub use clock::{Clock, ManualClock, SystemClock};
pub use file::FileStore;
pub use settings::Settings;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::Result;

/// Persisted key for the operating mode.
pub const MODE_KEY: &str = "mode";
/// Persisted key for the browsing intent.
pub const INTENT_KEY: &str = "browsingIntent";
/// Persisted key for calm summaries.
pub const CALM_SUMMARY_CACHE_KEY: &str = "calmSummaryCache";
/// Persisted key for usefulness assessments.
pub const USEFULNESS_CACHE_KEY: &str = "usefulnessAssessmentCache";
/// Persisted key for journal entries.
pub const JOURNAL_KEY: &str = "calmJournalEntries";

/// Async JSON key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value; `Ok(None)` when the key was never written.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write (or overwrite) a value.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("mode").await.unwrap(), None);

        store.set("mode", json!("focus")).await.unwrap();
        assert_eq!(store.get("mode").await.unwrap(), Some(json!("focus")));

        store.remove("mode").await.unwrap();
        store.remove("mode").await.unwrap();
        assert_eq!(store.get("mode").await.unwrap(), None);
    }
}
