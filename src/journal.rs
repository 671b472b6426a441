//! Mood-tagged journal.
//!
//! Entries live under `calmJournalEntries` as a JSON array, oldest first.
//! Moods come from the background service through [`MoodDetector`], which
//! never fails: anything that goes wrong yields the first mood.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::command::{Command, CommandClient};
use crate::storage::{Clock, JOURNAL_KEY, KeyValueStore};
use crate::tokens::FeatureTokens;
use crate::types::{DEFAULT_MOODS, JournalEntry};
use crate::{MindfulError, Result};

/// Quiet period before classifying text that is still being typed.
pub const MOOD_DEBOUNCE: Duration = Duration::from_millis(600);

const MEMO_CAPACITY: u64 = 64;
const MEMO_TTL: Duration = Duration::from_secs(10 * 60);
const DEBOUNCE_TOKEN: &str = "journalMood";

// ============================================================================
// MoodDetector
// ============================================================================

/// Classifies journal text into one of a fixed set of moods.
#[derive(Clone)]
pub struct MoodDetector {
    client: CommandClient,
    moods: Arc<[String]>,
    memo: Cache<String, String>,
    debounce: Duration,
    typing: FeatureTokens,
}

impl MoodDetector {
    /// Detector over the default mood list.
    pub fn new(client: CommandClient) -> Self {
        Self::with_moods(client, DEFAULT_MOODS.iter().map(|m| m.to_string()).collect())
    }

    /// Detector over a custom mood list. An empty list means the defaults.
    pub fn with_moods(client: CommandClient, moods: Vec<String>) -> Self {
        let moods = if moods.is_empty() {
            DEFAULT_MOODS.iter().map(|m| m.to_string()).collect()
        } else {
            moods
        };
        Self {
            client,
            moods: moods.into(),
            memo: Cache::builder()
                .max_capacity(MEMO_CAPACITY)
                .time_to_live(MEMO_TTL)
                .build(),
            debounce: MOOD_DEBOUNCE,
            typing: FeatureTokens::new(),
        }
    }

    /// Override the debounce interval. Default: [`MOOD_DEBOUNCE`].
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn moods(&self) -> &[String] {
        &self.moods
    }

    pub fn default_mood(&self) -> &str {
        self.moods.first().map(String::as_str).unwrap_or(DEFAULT_MOODS[0])
    }

    /// Classify `text` right away.
    #[instrument(name = "journal.classify", skip_all)]
    pub async fn classify(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return self.default_mood().to_string();
        }
        if let Some(mood) = self.memo.get(text).await {
            debug!(%mood, "mood memo hit");
            return mood;
        }

        let command = Command::ClassifyJournalMood {
            text: text.to_string(),
            moods: self.moods.to_vec(),
        };
        let mood = match self.client.send(command).await.and_then(|r| r.into_result()) {
            Ok(reply) => reply.mood.filter(|m| !m.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "mood detection failed");
                None
            }
        };
        match mood {
            Some(mood) => {
                self.memo.insert(text.to_string(), mood.clone()).await;
                mood
            }
            None => self.default_mood().to_string(),
        }
    }

    /// Classify text still being edited.
    ///
    /// Waits out the debounce interval; returns `None` if a newer call
    /// arrived meanwhile, so only the latest text gets classified.
    pub async fn classify_debounced(&self, text: &str) -> Option<String> {
        let token = self.typing.begin(DEBOUNCE_TOKEN);
        tokio::time::sleep(self.debounce).await;
        if !token.is_current() {
            return None;
        }
        let mood = self.classify(text).await;
        token.is_current().then_some(mood)
    }
}

// ============================================================================
// Journal
// ============================================================================

/// Persistent journal entries.
pub struct Journal {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    moods: MoodDetector,
}

impl Journal {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, moods: MoodDetector) -> Self {
        Self {
            store,
            clock,
            moods,
        }
    }

    pub fn mood_detector(&self) -> &MoodDetector {
        &self.moods
    }

    /// All entries, oldest first. Unreadable data reads as empty.
    pub async fn entries(&self) -> Vec<JournalEntry> {
        match self.store.get(JOURNAL_KEY).await {
            Ok(Some(Value::Array(items))) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "failed to read journal entries");
                Vec::new()
            }
        }
    }

    /// Classify and append a new entry.
    pub async fn add(&self, text: &str) -> Result<JournalEntry> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MindfulError::EmptyInput);
        }
        let mood = self.moods.classify(text).await;
        let entry = JournalEntry {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            mood,
            created_at: DateTime::<Utc>::from_timestamp_millis(self.clock.now_millis())
                .unwrap_or_else(Utc::now),
        };

        let mut entries = self.entries().await;
        entries.push(entry.clone());
        self.persist(&entries).await?;
        debug!(id = %entry.id, mood = %entry.mood, "journal entry saved");
        Ok(entry)
    }

    /// Remove an entry; returns whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut entries = self.entries().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.persist(&entries).await?;
        Ok(true)
    }

    async fn persist(&self, entries: &[JournalEntry]) -> Result<()> {
        self.store
            .set(JOURNAL_KEY, serde_json::to_value(entries)?)
            .await
            .map_err(|e| MindfulError::Storage(format!("failed to save journal: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandHandler, Reply, channel};
    use crate::storage::{ManualClock, MemoryStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedMood {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandHandler for FixedMood {
        async fn handle(&self, command: Command) -> Reply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match command {
                Command::ClassifyJournalMood { .. } => Reply::mood("Hopeful"),
                _ => Reply::failed("unexpected"),
            }
        }
    }

    fn detector() -> (MoodDetector, Arc<FixedMood>) {
        let handler = Arc::new(FixedMood {
            calls: AtomicUsize::new(0),
        });
        let (client, _server) = channel("background", handler.clone());
        (MoodDetector::new(client), handler)
    }

    #[tokio::test]
    async fn classification_is_memoized() {
        let (moods, handler) = detector();
        assert_eq!(moods.classify("a good day").await, "Hopeful");
        assert_eq!(moods.classify("  a good day ").await, "Hopeful");
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_service_falls_back_to_first_mood() {
        let moods = MoodDetector::new(CommandClient::detached("background"));
        assert_eq!(moods.classify("anything").await, "Calm");
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_keeps_only_the_latest_text() {
        let (moods, handler) = detector();
        let first = {
            let moods = moods.clone();
            tokio::spawn(async move { moods.classify_debounced("a go").await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = moods.classify_debounced("a good day").await;

        assert_eq!(first.await.unwrap(), None);
        assert_eq!(second.as_deref(), Some("Hopeful"));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn add_and_delete_entries() {
        let (moods, _) = detector();
        let journal = Journal::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(1_700_000_000_000)),
            moods,
        );

        assert!(matches!(journal.add("   ").await, Err(MindfulError::EmptyInput)));

        let entry = journal.add("Finished the draft").await.unwrap();
        assert_eq!(entry.mood, "Hopeful");
        assert_eq!(entry.created_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(journal.entries().await, vec![entry.clone()]);

        assert!(journal.delete(&entry.id).await.unwrap());
        assert!(!journal.delete(&entry.id).await.unwrap());
        assert!(journal.entries().await.is_empty());
    }
}
