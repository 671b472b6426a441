use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::{INTENT_KEY, KeyValueStore, MODE_KEY};
use crate::Result;
use crate::types::Mode;

/// Typed access to the persisted mode and browsing intent.
///
/// Reads never fail: unreadable or unexpected values fall back to the
/// defaults (calm mode, empty intent).
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn KeyValueStore>,
}

impl Settings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn mode(&self) -> Mode {
        match self.store.get(MODE_KEY).await {
            Ok(Some(Value::String(s))) => s.parse().unwrap_or_default(),
            Ok(_) => Mode::default(),
            Err(e) => {
                warn!(error = %e, "failed to read mode, using default");
                Mode::default()
            }
        }
    }

    pub async fn set_mode(&self, mode: Mode) -> Result<()> {
        self.store
            .set(MODE_KEY, Value::String(mode.as_str().to_string()))
            .await
    }

    pub async fn intent(&self) -> String {
        match self.store.get(INTENT_KEY).await {
            Ok(Some(Value::String(s))) => s,
            Ok(_) => String::new(),
            Err(e) => {
                warn!(error = %e, "failed to read browsing intent, using empty");
                String::new()
            }
        }
    }

    /// Persist a trimmed intent.
    pub async fn set_intent(&self, intent: &str) -> Result<()> {
        self.store
            .set(INTENT_KEY, Value::String(intent.trim().to_string()))
            .await
    }
}
