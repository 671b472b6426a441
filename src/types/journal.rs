use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moods offered when the caller supplies none.
pub const DEFAULT_MOODS: [&str; 9] = [
    "Calm",
    "Grateful",
    "Productive",
    "Stressed",
    "Hopeful",
    "Low",
    "Reflective",
    "Proud",
    "Conflicted",
];

/// One mood-tagged journal entry, as persisted under `calmJournalEntries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub text: String,
    pub mood: String,
    pub created_at: DateTime<Utc>,
}
