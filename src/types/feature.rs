use std::fmt;

use serde::{Deserialize, Serialize};

/// User-triggerable features dispatched through `executeFeature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    CalmSummarize,
    Breathe,
    Journal,
    BlinkBuddy,
}

impl Feature {
    /// Wire name, also used as the feature's token name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::CalmSummarize => "calmSummarize",
            Feature::Breathe => "breathe",
            Feature::Journal => "journal",
            Feature::BlinkBuddy => "blinkBuddy",
        }
    }

    /// Parse a wire name; unknown names yield `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "calmSummarize" => Some(Feature::CalmSummarize),
            "breathe" => Some(Feature::Breathe),
            "journal" => Some(Feature::Journal),
            "blinkBuddy" => Some(Feature::BlinkBuddy),
            _ => None,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which fallback tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// In-page capability reached over the bridge.
    Bridge,
    /// Privileged background context.
    Background,
    /// A previously cached result, shown because fresh computation failed.
    Saved,
    /// Minimal stand-in built without any capability.
    Degraded,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Bridge => "bridge",
            Provenance::Background => "background",
            Provenance::Saved => "saved",
            Provenance::Degraded => "degraded",
        }
    }
}

/// Outcome of an orchestrated feature request.
///
/// Cancellation is not an error: a request superseded by a newer one (or
/// explicitly cancelled) reports `Cancelled` and has applied nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureOutcome<T> {
    Ready { value: T, provenance: Provenance },
    Cancelled,
}

impl<T> FeatureOutcome<T> {
    pub fn ready(value: T, provenance: Provenance) -> Self {
        FeatureOutcome::Ready { value, provenance }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FeatureOutcome::Cancelled)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FeatureOutcome::Ready { value, .. } => Some(value),
            FeatureOutcome::Cancelled => None,
        }
    }

    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            FeatureOutcome::Ready { provenance, .. } => Some(*provenance),
            FeatureOutcome::Cancelled => None,
        }
    }
}
