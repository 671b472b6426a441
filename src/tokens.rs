//! Per-feature request tokens.
//!
//! Starting a request for a feature bumps that feature's epoch and hands
//! back a [`RequestToken`] holding the new value. Work that finishes after
//! a newer request started (or after an explicit cancel) sees a stale token
//! and must not apply its result. Epochs only ever grow.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Epoch counters keyed by feature name. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct FeatureTokens {
    epochs: Arc<Mutex<HashMap<String, u64>>>,
}

impl FeatureTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding any in flight for `feature`.
    pub fn begin(&self, feature: &str) -> RequestToken {
        let epoch = self.bump(feature);
        RequestToken {
            feature: feature.to_string(),
            epoch,
            tokens: self.clone(),
        }
    }

    /// Invalidate whatever request is in flight for `feature`.
    pub fn cancel(&self, feature: &str) {
        self.bump(feature);
    }

    pub fn current(&self, feature: &str) -> u64 {
        self.lock().get(feature).copied().unwrap_or(0)
    }

    fn bump(&self, feature: &str) -> u64 {
        let mut epochs = self.lock();
        let epoch = epochs.entry(feature.to_string()).or_insert(0);
        *epoch += 1;
        *epoch
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.epochs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Captured epoch of one feature request.
#[derive(Debug, Clone)]
pub struct RequestToken {
    feature: String,
    epoch: u64,
    tokens: FeatureTokens,
}

impl RequestToken {
    /// Whether no newer request or cancel happened since this one began.
    pub fn is_current(&self) -> bool {
        self.tokens.current(&self.feature) == self.epoch
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_request_supersedes_older() {
        let tokens = FeatureTokens::new();
        let first = tokens.begin("calmSummarize");
        assert!(first.is_current());

        let second = tokens.begin("calmSummarize");
        assert!(!first.is_current());
        assert!(second.is_current());
        assert!(second.epoch() > first.epoch());
    }

    #[test]
    fn cancel_invalidates_without_new_token() {
        let tokens = FeatureTokens::new();
        let token = tokens.begin("journal");
        tokens.cancel("journal");
        assert!(!token.is_current());
        assert_eq!(tokens.current("journal"), 2);
    }

    #[test]
    fn features_are_independent() {
        let tokens = FeatureTokens::new();
        let summary = tokens.begin("calmSummarize");
        tokens.cancel("journal");
        assert!(summary.is_current());
    }
}
