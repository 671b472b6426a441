//! Drift detection over usefulness scores.
//!
//! Two triggers raise a refocus nudge while in focus mode:
//!
//! - **consecutive**: `consecutive_limit` low scores on distinct resources
//! - **dwell**: `dwell_limit` spent on one low-scoring resource, measured by
//!   [`DriftDetector::tick`]
//!
//! ```text
//! NORMAL ──low score──► LOW_STREAK ──limit──► NUDGED ──respond──► NORMAL
//!    ▲                      │                                │
//!    └────score ≥ threshold─┘                   snooze ──► SNOOZED (per resource)
//! ```
//!
//! At most one nudge is visible at a time. When a trigger fires while a
//! nudge is showing, its state changes still apply but nothing new is shown.
//! A dwell nudge suppresses consecutive counting on its resource until the
//! resource changes; a consecutive nudge does not suppress dwell.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use crate::telemetry;

/// Thresholds for [`DriftDetector`].
#[derive(Debug, Clone, PartialEq)]
pub struct DriftConfig {
    /// Scores below this are low. Default: 4.
    pub threshold: u8,
    /// Low scores on distinct resources before a nudge. Default: 3.
    pub consecutive_limit: u32,
    /// Time on one low-scoring resource before a nudge. Default: 60s.
    pub dwell_limit: Duration,
    /// Interval the dwell ticker runs at. Default: 1s.
    pub tick: Duration,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            threshold: 4,
            consecutive_limit: 3,
            dwell_limit: Duration::from_secs(60),
            tick: Duration::from_secs(1),
        }
    }
}

impl DriftConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn consecutive_limit(mut self, limit: u32) -> Self {
        self.consecutive_limit = limit;
        self
    }

    pub fn dwell_limit(mut self, limit: Duration) -> Self {
        self.dwell_limit = limit;
        self
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgeTrigger {
    Consecutive,
    Dwell,
}

impl NudgeTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            NudgeTrigger::Consecutive => "consecutive",
            NudgeTrigger::Dwell => "dwell",
        }
    }
}

impl fmt::Display for NudgeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A refocus nudge to present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nudge {
    pub trigger: NudgeTrigger,
    /// Resource the nudge was raised on.
    pub resource: String,
}

impl Nudge {
    pub fn title(&self) -> &'static str {
        "Drifting Away?"
    }

    pub fn message(&self, intent: &str, consecutive_limit: u32) -> String {
        let opening = match self.trigger {
            NudgeTrigger::Consecutive => {
                format!("You've visited {consecutive_limit} pages with low usefulness scores.")
            }
            NudgeTrigger::Dwell => {
                "You've been on this page for a while, but it's not very useful for your goal."
                    .to_string()
            }
        };
        format!(
            "{opening}\n\nRemember your goal: {intent}\n\nYou seem to be drifting away. Want to refocus?"
        )
    }
}

/// User response to a visible nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgeResponse {
    /// Dismiss and show a refocus message.
    Refocus,
    /// Stop nudging on this resource until it changes.
    Snooze,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftPhase {
    Normal,
    LowStreak,
    Nudged,
    Snoozed,
}

#[derive(Debug, Clone)]
struct DwellTimer {
    resource: String,
    elapsed: Duration,
}

/// Drift state machine. Owned by one content agent.
#[derive(Debug, Clone)]
pub struct DriftDetector {
    config: DriftConfig,
    consecutive: u32,
    /// Last resource that contributed to the consecutive count.
    last_counted: Option<String>,
    current: Option<String>,
    dwell: Option<DwellTimer>,
    snoozed: Option<String>,
    /// Resource whose dwell nudge blocks consecutive counting.
    suppressed: Option<String>,
    active: Option<Nudge>,
}

impl DriftDetector {
    pub fn new(config: DriftConfig) -> Self {
        Self {
            config,
            consecutive: 0,
            last_counted: None,
            current: None,
            dwell: None,
            snoozed: None,
            suppressed: None,
            active: None,
        }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    pub fn consecutive_count(&self) -> u32 {
        self.consecutive
    }

    pub fn dwell_elapsed(&self) -> Option<Duration> {
        self.dwell.as_ref().map(|d| d.elapsed)
    }

    pub fn active_nudge(&self) -> Option<&Nudge> {
        self.active.as_ref()
    }

    pub fn phase(&self) -> DriftPhase {
        if self.active.is_some() {
            DriftPhase::Nudged
        } else if self.snoozed.is_some() && self.snoozed == self.current {
            DriftPhase::Snoozed
        } else if self.consecutive > 0 || self.dwell.is_some() {
            DriftPhase::LowStreak
        } else {
            DriftPhase::Normal
        }
    }

    /// Feed a parsed score for `resource`.
    pub fn observe(&mut self, resource: &str, score: u8) -> Option<Nudge> {
        if self.current.as_deref() != Some(resource) {
            self.resource_changed(resource);
        }
        if self.snoozed.as_deref() == Some(resource) {
            debug!(resource, "resource snoozed, ignoring score");
            return None;
        }

        if score >= self.config.threshold {
            self.consecutive = 0;
            self.last_counted = None;
            self.dwell = None;
            return None;
        }

        let suppressed = self.suppressed.as_deref() == Some(resource);
        let already_counted = self.last_counted.as_deref() == Some(resource);
        if !suppressed && !already_counted {
            self.consecutive += 1;
            self.last_counted = Some(resource.to_string());
        }
        if self.dwell.is_none() {
            self.dwell = Some(DwellTimer {
                resource: resource.to_string(),
                elapsed: Duration::ZERO,
            });
        }
        debug!(resource, score, consecutive = self.consecutive, "low usefulness score");

        if self.consecutive >= self.config.consecutive_limit {
            self.dwell = None;
            self.consecutive = 0;
            return self.raise(NudgeTrigger::Consecutive, resource);
        }
        None
    }

    /// Advance the dwell timer.
    pub fn tick(&mut self, elapsed: Duration) -> Option<Nudge> {
        let timer = self.dwell.as_mut()?;
        timer.elapsed += elapsed;
        if timer.elapsed < self.config.dwell_limit {
            return None;
        }

        let resource = timer.resource.clone();
        self.dwell = None;
        let nudge = self.raise(NudgeTrigger::Dwell, &resource);
        if nudge.is_some() {
            self.suppressed = Some(resource);
            self.consecutive = 0;
        }
        nudge
    }

    /// Apply the user's response to the visible nudge.
    pub fn respond(&mut self, response: NudgeResponse) {
        let nudged = self.active.take().map(|n| n.resource);
        if response == NudgeResponse::Snooze {
            let resource = nudged.or_else(|| self.current.clone());
            self.dwell = None;
            self.consecutive = 0;
            self.snoozed = resource.clone();
            self.suppressed = resource;
        }
    }

    /// Close the visible nudge without any other effect.
    pub fn dismiss(&mut self) {
        self.active = None;
    }

    /// The user moved to another resource.
    ///
    /// Snooze and dwell suppression end and dwell measurement restarts;
    /// the consecutive count carries over.
    pub fn resource_changed(&mut self, resource: &str) {
        self.current = Some(resource.to_string());
        self.snoozed = None;
        self.suppressed = None;
        self.dwell = None;
    }

    /// Clear every counter (intent or mode changed). A visible nudge stays.
    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.last_counted = None;
        self.dwell = None;
        self.snoozed = None;
        self.suppressed = None;
    }

    fn raise(&mut self, trigger: NudgeTrigger, resource: &str) -> Option<Nudge> {
        if self.active.is_some() {
            debug!(%trigger, "nudge already visible");
            return None;
        }
        let nudge = Nudge {
            trigger,
            resource: resource.to_string(),
        };
        info!(%trigger, resource, "drift nudge");
        metrics::counter!(telemetry::NUDGES_TOTAL, "trigger" => trigger.as_str()).increment(1);
        self.active = Some(nudge.clone());
        Some(nudge)
    }
}

impl Default for DriftDetector {
    fn default() -> Self {
        Self::new(DriftConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn same_resource_is_not_double_counted() {
        let mut drift = DriftDetector::default();
        assert_eq!(drift.observe("a", 2), None);
        assert_eq!(drift.observe("a", 2), None);
        assert_eq!(drift.observe("a", 1), None);
        assert_eq!(drift.consecutive_count(), 1);
    }

    #[test]
    fn visible_nudge_blocks_a_second_one() {
        let mut drift = DriftDetector::new(DriftConfig::new().consecutive_limit(1));
        assert!(drift.observe("a", 0).is_some());
        assert_eq!(drift.observe("b", 0), None);
        assert_eq!(drift.phase(), DriftPhase::Nudged);

        drift.respond(NudgeResponse::Refocus);
        assert!(drift.observe("c", 0).is_some());
    }

    #[test]
    fn snooze_silences_resource_until_it_changes() {
        let mut drift = DriftDetector::new(DriftConfig::new().consecutive_limit(1));
        assert!(drift.observe("a", 0).is_some());
        drift.respond(NudgeResponse::Snooze);
        assert_eq!(drift.phase(), DriftPhase::Snoozed);

        assert_eq!(drift.observe("a", 0), None);
        for _ in 0..120 {
            assert_eq!(drift.tick(SECOND), None);
        }

        assert!(drift.observe("b", 0).is_some());
    }

    #[test]
    fn resource_change_keeps_consecutive_count() {
        let mut drift = DriftDetector::default();
        drift.observe("a", 1);
        drift.resource_changed("b");
        assert_eq!(drift.consecutive_count(), 1);
        assert_eq!(drift.dwell_elapsed(), None);
    }

    #[test]
    fn reset_clears_counters() {
        let mut drift = DriftDetector::default();
        drift.observe("a", 1);
        drift.observe("b", 1);
        drift.reset();
        assert_eq!(drift.consecutive_count(), 0);
        assert_eq!(drift.phase(), DriftPhase::Normal);
    }

    #[test]
    fn nudge_messages() {
        let nudge = Nudge {
            trigger: NudgeTrigger::Consecutive,
            resource: "a".into(),
        };
        assert!(nudge.message("learn rust", 3).starts_with("You've visited 3 pages"));
        assert!(nudge.message("learn rust", 3).contains("Remember your goal: learn rust"));
    }
}
