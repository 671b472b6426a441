use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The kinds of AI capability a context can hold a session for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Summarizer,
    Rewriter,
    /// General prompting session, used for scoring and fallbacks.
    LanguageModel,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Summarizer => "summarizer",
            CapabilityKind::Rewriter => "rewriter",
            CapabilityKind::LanguageModel => "language_model",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability reported by a capability before creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    /// The model must be downloaded before a session can be created.
    Downloadable,
    Downloading,
    Unavailable,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Downloadable => "downloadable",
            Availability::Downloading => "downloading",
            Availability::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model download progress tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Fraction in `[0, 1]`, when the provider knows it.
    pub loaded: Option<f64>,
}

impl DownloadProgress {
    /// Whole percentage, clamped to `[0, 100]`.
    pub fn percent(&self) -> Option<u8> {
        self.loaded
            .filter(|f| f.is_finite())
            .map(|f| (f.clamp(0.0, 1.0) * 100.0).round() as u8)
    }

    /// Human-readable status line for the progress tick.
    pub fn status_line(&self) -> String {
        match self.percent() {
            Some(pct) => format!("Downloading on-device model… {pct}%"),
            None => "Downloading on-device model…".to_string(),
        }
    }
}

/// Callback receiving download progress while a session is being created.
pub type DownloadMonitor = Arc<dyn Fn(DownloadProgress) + Send + Sync>;
