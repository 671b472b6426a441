use serde::{Deserialize, Serialize};

/// Best-effort text of the current page, as handed over by a text extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub text: String,
    pub title: String,
    pub url: String,
}

impl PageSnapshot {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            text: text.into(),
        }
    }

    /// Whether there is any text worth sending to a capability.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}
