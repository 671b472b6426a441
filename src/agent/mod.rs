//! Content agent: the per-page orchestrator.
//!
//! Both page features run the same tier chain:
//!
//! ```text
//! cache (shown at once) ─► page bridge ─► background service ─► saved ─► degraded
//! ```
//!
//! - A fresh cached result is presented immediately and refreshed behind it.
//! - The bridge tier is skipped when the agent has no bridge.
//! - Each request takes a [`RequestToken`]; a newer request for the same
//!   feature (or an intent update) makes every later step of the older one
//!   a no-op, and it reports [`FeatureOutcome::Cancelled`].
//! - Any result with a real score feeds the [`DriftDetector`] while in
//!   focus mode. Degraded scores never do.

mod extract;
mod presenter;

pub use extract::{LayeredExtractor, MIN_USEFUL_CHARS, StaticText, TextExtractor, TextSource, host_of};
pub use presenter::{NullPresenter, Presenter, View};

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::bridge::{PageBridge, RequestMetadata, StatusCallback};
use crate::cache::{CacheConfig, CacheKey, CalmSummaryEntry, ResultCache, UsefulnessEntry};
use crate::command::{Command, CommandClient, CommandHandler, Reply};
use crate::drift::{DriftConfig, DriftDetector, NudgeResponse};
use crate::storage::{Clock, KeyValueStore, Settings, SystemClock};
use crate::text::{ensure_bold_highlights, truncate_chars};
use crate::tokens::{FeatureTokens, RequestToken};
use crate::types::{
    CalmSummary, Feature, FeatureOutcome, Mode, PageSnapshot, Provenance, SummaryPipeline,
    UsefulnessAssessment,
};
use crate::{MindfulError, Result, telemetry};

/// Token name for usefulness assessments.
pub const USEFULNESS_FEATURE: &str = "usefulness";

/// Characters of page text kept in a degraded summary.
pub const DEGRADED_SUMMARY_CHARS: usize = 500;

const NOTE_SAVED_SCORE_UNREADABLE: &str = "Using saved score. Unable to read this page right now.";
const NOTE_SAVED_INSIGHTS: &str = "Showing saved insights. Latest analysis unavailable.";
const NOTE_SAVED_SUMMARY: &str = "Showing saved result. Latest summary unavailable.";

/// `"just now"`, `"N min(s) ago"`, `"N hour(s) ago"`, else the local date.
pub fn relative_time(now_millis: i64, timestamp_millis: i64) -> String {
    const MINUTE: i64 = 60 * 1000;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    let delta = now_millis.saturating_sub(timestamp_millis);
    if delta < MINUTE {
        return "just now".to_string();
    }
    if delta < HOUR {
        let minutes = (delta as f64 / MINUTE as f64).round() as i64;
        return format!("{minutes} min{} ago", if minutes == 1 { "" } else { "s" });
    }
    if delta < DAY {
        let hours = (delta as f64 / HOUR as f64).round() as i64;
        return format!("{hours} hour{} ago", if hours == 1 { "" } else { "s" });
    }
    DateTime::from_timestamp_millis(timestamp_millis)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default)]
struct Focus {
    mode: Mode,
    intent: String,
}

impl Focus {
    fn tracks_drift(&self) -> bool {
        self.mode == Mode::Focus && !self.intent.is_empty()
    }
}

struct AgentInner {
    settings: Settings,
    bridge: Option<Arc<PageBridge>>,
    background: CommandClient,
    summaries: ResultCache<CalmSummaryEntry>,
    assessments: ResultCache<UsefulnessEntry>,
    tokens: FeatureTokens,
    drift: Mutex<DriftDetector>,
    focus: Mutex<Focus>,
    extractor: Arc<dyn TextExtractor>,
    presenter: Arc<dyn Presenter>,
    clock: Arc<dyn Clock>,
}

/// Orchestrator for one page. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ContentAgent {
    inner: Arc<AgentInner>,
}

impl ContentAgent {
    pub fn builder(
        store: Arc<dyn KeyValueStore>,
        background: CommandClient,
        extractor: Arc<dyn TextExtractor>,
        presenter: Arc<dyn Presenter>,
    ) -> ContentAgentBuilder {
        ContentAgentBuilder {
            store,
            background,
            extractor,
            presenter,
            bridge: None,
            clock: Arc::new(SystemClock),
            drift: DriftConfig::default(),
            calm_summary_cache: CacheConfig::calm_summary(),
            usefulness_cache: CacheConfig::usefulness(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.focus().mode
    }

    pub fn intent(&self) -> String {
        self.focus().intent.clone()
    }

    pub fn tokens(&self) -> &FeatureTokens {
        &self.inner.tokens
    }

    /// Snapshot of the drift state.
    pub fn drift(&self) -> DriftDetector {
        self.drift_state().clone()
    }

    /// Load the persisted mode and intent and show the focus bar if needed.
    pub async fn initialize(&self) -> Option<Result<FeatureOutcome<UsefulnessAssessment>>> {
        let mode = self.inner.settings.mode().await;
        let intent = self.inner.settings.intent().await;
        info!(%mode, has_intent = !intent.is_empty(), "content agent initialized");
        if self.set_focus(mode, intent) {
            Some(self.assess_current_page().await)
        } else {
            None
        }
    }

    // ========================================================================
    // Usefulness
    // ========================================================================

    /// Score the current page against the intent.
    #[instrument(name = "agent.assess", skip(self))]
    pub async fn assess_current_page(&self) -> Result<FeatureOutcome<UsefulnessAssessment>> {
        let token = self.inner.tokens.begin(USEFULNESS_FEATURE);
        let intent = self.intent();
        if intent.is_empty() {
            return Err(MindfulError::InvalidInput("No browsing intent set.".to_string()));
        }

        let page = self.inner.extractor.snapshot().await;
        let key = CacheKey::with_intent(&page.url, &intent);
        let cached = self.inner.assessments.get(&key).await.and_then(|entry| {
            let when = relative_time(self.inner.clock.now_millis(), entry.timestamp);
            match UsefulnessAssessment::parse(&entry.assessment) {
                Ok(assessment) => Some((assessment, when)),
                Err(e) => {
                    debug!(error = %e, "ignoring unparseable saved assessment");
                    None
                }
            }
        });

        match &cached {
            Some((assessment, when)) => {
                let note = if when.is_empty() {
                    "Showing saved score while refreshing...".to_string()
                } else {
                    format!("Showing saved score from {when} while refreshing...")
                };
                self.show_assessment(&token, &page.url, assessment, Provenance::Saved, Some(note));
            }
            None => {
                self.present(&token, View::AssessmentLoading);
            }
        }

        if !page.has_text() {
            return match cached {
                Some((assessment, _)) => {
                    self.show_assessment(
                        &token,
                        &page.url,
                        &assessment,
                        Provenance::Saved,
                        Some(NOTE_SAVED_SCORE_UNREADABLE.to_string()),
                    );
                    Ok(self.finish_usefulness(&token, assessment, Provenance::Saved))
                }
                None => {
                    self.present(&token, View::NoContent);
                    Err(MindfulError::EmptyInput)
                }
            };
        }

        match self.fresh_assessment(&token, &intent, &page).await {
            Ok((assessment, provenance)) => {
                if !token.is_current() {
                    return Ok(FeatureOutcome::Cancelled);
                }
                if let Err(e) = self
                    .inner
                    .assessments
                    .put(key, assessment.to_text())
                    .await
                {
                    warn!(error = %e, "failed to cache assessment");
                }
                self.show_assessment(&token, &page.url, &assessment, provenance, None);
                Ok(self.finish_usefulness(&token, assessment, provenance))
            }
            Err(e) => {
                if !token.is_current() {
                    return Ok(FeatureOutcome::Cancelled);
                }
                warn!(error = %e, "usefulness assessment failed on every tier");
                match cached {
                    Some((assessment, _)) => {
                        self.show_assessment(
                            &token,
                            &page.url,
                            &assessment,
                            Provenance::Saved,
                            Some(NOTE_SAVED_INSIGHTS.to_string()),
                        );
                        Ok(self.finish_usefulness(&token, assessment, Provenance::Saved))
                    }
                    None => {
                        let assessment = UsefulnessAssessment::degraded(&intent);
                        self.present(
                            &token,
                            View::Assessment {
                                assessment: assessment.clone(),
                                provenance: Provenance::Degraded,
                                note: Some(format!("AI assessment unavailable. Error: {e}.")),
                            },
                        );
                        Ok(self.finish_usefulness(&token, assessment, Provenance::Degraded))
                    }
                }
            }
        }
    }

    async fn fresh_assessment(
        &self,
        token: &RequestToken,
        intent: &str,
        page: &PageSnapshot,
    ) -> Result<(UsefulnessAssessment, Provenance)> {
        if let Some(bridge) = &self.inner.bridge {
            let metadata = RequestMetadata {
                intent: intent.to_string(),
                title: page.title.clone(),
                url: page.url.clone(),
            };
            let on_status = self.status_callback(token, View::AssessmentStatus);
            match bridge.assess(&page.text, metadata, Some(on_status)).await {
                Ok(payload) => match UsefulnessAssessment::parse(&payload.assessment_text) {
                    Ok(assessment) => return Ok((assessment, Provenance::Bridge)),
                    Err(e) => warn!(error = %e, "unparseable page assessment, trying background"),
                },
                Err(e) => debug!(error = %e, "page bridge unavailable for assessment"),
            }
        }

        let reply = self
            .inner
            .background
            .send(Command::AssessUsefulness {
                intent: intent.to_string(),
                page_text: page.text.clone(),
                page_title: page.title.clone(),
                page_url: page.url.clone(),
            })
            .await?
            .into_result()?;
        let text = reply.assessment.unwrap_or_default();
        Ok((UsefulnessAssessment::parse(&text)?, Provenance::Background))
    }

    fn show_assessment(
        &self,
        token: &RequestToken,
        url: &str,
        assessment: &UsefulnessAssessment,
        provenance: Provenance,
        note: Option<String>,
    ) {
        let shown = self.present(
            token,
            View::Assessment {
                assessment: assessment.clone(),
                provenance,
                note,
            },
        );
        if shown && let Some(score) = assessment.score {
            self.observe_score(url, score);
        }
    }

    fn observe_score(&self, url: &str, score: u8) {
        let focus = self.focus().clone();
        if !focus.tracks_drift() {
            return;
        }
        let nudge = self.drift_state().observe(url, score);
        if let Some(nudge) = nudge {
            let limit = self.drift_state().config().consecutive_limit;
            let message = nudge.message(&focus.intent, limit);
            self.inner.presenter.present(View::Nudge { nudge, message });
        }
    }

    fn finish_usefulness(
        &self,
        token: &RequestToken,
        assessment: UsefulnessAssessment,
        provenance: Provenance,
    ) -> FeatureOutcome<UsefulnessAssessment> {
        if !token.is_current() {
            return FeatureOutcome::Cancelled;
        }
        metrics::counter!(telemetry::FALLBACK_RESULTS_TOTAL,
            "feature" => USEFULNESS_FEATURE,
            "tier" => provenance.as_str(),
        )
        .increment(1);
        FeatureOutcome::ready(assessment, provenance)
    }

    // ========================================================================
    // Calm summary
    // ========================================================================

    /// Produce a calm summary of the current page.
    ///
    /// Results are applied only while the agent is in calm mode.
    #[instrument(name = "agent.calm_summarize", skip(self))]
    pub async fn calm_summarize(&self) -> Result<FeatureOutcome<CalmSummary>> {
        let token = self.inner.tokens.begin(Feature::CalmSummarize.as_str());
        self.present_calm(
            &token,
            View::SummaryLoading("Creating a gentle summary of this page...".to_string()),
        );

        let page = self.inner.extractor.snapshot().await;
        let key = CacheKey::url(&page.url);
        let cached = self.inner.summaries.get(&key).await;
        if let Some(entry) = &cached {
            let when = relative_time(self.inner.clock.now_millis(), entry.timestamp);
            self.present_calm(
                &token,
                View::SummarySnippet {
                    summary: saved_summary(&entry.summary),
                    when,
                },
            );
            self.present_calm(
                &token,
                View::SummaryStatus("Refreshing your calm summary...".to_string()),
            );
        }

        if !page.has_text() {
            return Err(MindfulError::EmptyInput);
        }

        match self.fresh_summary(&token, &page).await {
            Ok((summary, provenance)) => {
                if !self.calm_active(&token) {
                    return Ok(FeatureOutcome::Cancelled);
                }
                if let Err(e) = self.inner.summaries.put(key, summary.text.clone()).await {
                    warn!(error = %e, "failed to cache calm summary");
                }
                self.present_calm(
                    &token,
                    View::Summary {
                        summary: summary.clone(),
                        provenance,
                        note: None,
                    },
                );
                Ok(self.finish_summary(summary, provenance))
            }
            Err(e) => {
                if !self.calm_active(&token) {
                    return Ok(FeatureOutcome::Cancelled);
                }
                warn!(error = %e, "calm summary failed on every tier");
                let (summary, provenance, note) = match cached {
                    Some(entry) => (
                        saved_summary(&entry.summary),
                        Provenance::Saved,
                        Some(NOTE_SAVED_SUMMARY.to_string()),
                    ),
                    None => (
                        CalmSummary::new(
                            format!("{}...", truncate_chars(&page.text, DEGRADED_SUMMARY_CHARS)),
                            SummaryPipeline::Raw,
                        ),
                        Provenance::Degraded,
                        None,
                    ),
                };
                self.present_calm(
                    &token,
                    View::Summary {
                        summary: summary.clone(),
                        provenance,
                        note,
                    },
                );
                Ok(self.finish_summary(summary, provenance))
            }
        }
    }

    async fn fresh_summary(
        &self,
        token: &RequestToken,
        page: &PageSnapshot,
    ) -> Result<(CalmSummary, Provenance)> {
        if let Some(bridge) = &self.inner.bridge {
            let metadata = RequestMetadata {
                intent: self.intent(),
                title: page.title.clone(),
                url: page.url.clone(),
            };
            let on_status = self.status_callback(token, View::SummaryStatus);
            match bridge.summarize(&page.text, metadata, Some(on_status)).await {
                Ok(summary) => return Ok((summary, Provenance::Bridge)),
                Err(e) => debug!(error = %e, "page bridge unavailable for summary"),
            }
        }
        if !self.calm_active(token) {
            return Err(MindfulError::RemoteError("request superseded".to_string()));
        }

        self.present_calm(
            token,
            View::SummaryStatus("Letting the calm settle into a summary...".to_string()),
        );
        let reply = self
            .inner
            .background
            .send(Command::SummarizePage {
                page_text: page.text.clone(),
            })
            .await?
            .into_result()?;
        let summary = reply.into_summary().ok_or_else(|| {
            MindfulError::MalformedResponse("summary reply carried no summary".to_string())
        })?;
        Ok((summary, Provenance::Background))
    }

    fn calm_active(&self, token: &RequestToken) -> bool {
        token.is_current() && self.mode() == Mode::Calm
    }

    fn present_calm(&self, token: &RequestToken, view: View) -> bool {
        if !self.calm_active(token) {
            return false;
        }
        self.inner.presenter.present(view);
        true
    }

    fn finish_summary(
        &self,
        summary: CalmSummary,
        provenance: Provenance,
    ) -> FeatureOutcome<CalmSummary> {
        metrics::counter!(telemetry::FALLBACK_RESULTS_TOTAL,
            "feature" => Feature::CalmSummarize.as_str(),
            "tier" => provenance.as_str(),
        )
        .increment(1);
        FeatureOutcome::ready(summary, provenance)
    }

    // ========================================================================
    // Intent, resource changes and nudges
    // ========================================================================

    /// Apply a new mode and intent: cancel calm work, reset drift, and
    /// show or hide the focus bar. Returns the refresh task when one starts.
    pub fn update_intent(
        &self,
        intent: &str,
        mode: Mode,
    ) -> Option<JoinHandle<Result<FeatureOutcome<UsefulnessAssessment>>>> {
        self.inner.tokens.cancel(Feature::CalmSummarize.as_str());
        self.inner.tokens.cancel(Feature::Journal.as_str());
        self.drift_state().reset();
        if !self.set_focus(mode, intent.trim().to_string()) {
            return None;
        }
        let agent = self.clone();
        Some(tokio::spawn(async move { agent.assess_current_page().await }))
    }

    /// Store mode and intent; shows or hides the focus bar. Returns whether
    /// drift tracking is now active.
    fn set_focus(&self, mode: Mode, intent: String) -> bool {
        let tracks = {
            let mut focus = self.focus();
            focus.mode = mode;
            focus.intent = intent.clone();
            focus.tracks_drift()
        };
        if tracks {
            self.inner.presenter.present(View::FocusBar { intent });
        } else {
            self.inner.presenter.present(View::FocusBarHidden);
        }
        tracks
    }

    /// The user moved to `url`. Re-assesses in focus mode.
    pub async fn resource_changed(
        &self,
        url: &str,
    ) -> Option<Result<FeatureOutcome<UsefulnessAssessment>>> {
        debug!(%url, "resource changed");
        self.drift_state().resource_changed(url);
        if self.focus().tracks_drift() {
            Some(self.assess_current_page().await)
        } else {
            None
        }
    }

    pub fn respond_to_nudge(&self, response: NudgeResponse) {
        self.drift_state().respond(response);
        match response {
            NudgeResponse::Refocus => self.inner.presenter.present(View::Refocus {
                intent: self.intent(),
            }),
            NudgeResponse::Snooze => self.inner.presenter.present(View::NudgeSnoozed),
        }
    }

    /// Drive the dwell timer every configured tick until the agent is dropped.
    pub fn spawn_dwell_ticker(&self) -> JoinHandle<()> {
        let weak: Weak<AgentInner> = Arc::downgrade(&self.inner);
        let tick = self.drift_state().config().tick;
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + tick;
            let mut interval = tokio::time::interval_at(start, tick);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let agent = ContentAgent { inner };
                let focus = agent.focus().clone();
                if !focus.tracks_drift() {
                    continue;
                }
                let nudge = agent.drift_state().tick(tick);
                if let Some(nudge) = nudge {
                    let limit = agent.drift_state().config().consecutive_limit;
                    let message = nudge.message(&focus.intent, limit);
                    agent.inner.presenter.present(View::Nudge { nudge, message });
                }
            }
            debug!("dwell ticker stopped");
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn present(&self, token: &RequestToken, view: View) -> bool {
        if !token.is_current() {
            return false;
        }
        self.inner.presenter.present(view);
        true
    }

    fn status_callback(&self, token: &RequestToken, view: fn(String) -> View) -> StatusCallback {
        let token = token.clone();
        let presenter = self.inner.presenter.clone();
        Arc::new(move |status: &str| {
            if !status.is_empty() && token.is_current() {
                presenter.present(view(status.to_string()));
            }
        })
    }

    fn focus(&self) -> MutexGuard<'_, Focus> {
        self.inner
            .focus
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn drift_state(&self) -> MutexGuard<'_, DriftDetector> {
        self.inner
            .drift
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn saved_summary(text: &str) -> CalmSummary {
    CalmSummary::new(ensure_bold_highlights(text), SummaryPipeline::Prompt)
}

#[async_trait]
impl CommandHandler for ContentAgent {
    async fn handle(&self, command: Command) -> Reply {
        match command {
            Command::Ping => Reply::ready(),
            Command::UpdateIntent { intent, mode } => {
                self.update_intent(&intent, mode);
                Reply::ok()
            }
            // Mode and intent travel with the command but only `updateIntent`
            // changes them.
            Command::ExecuteFeature { feature, .. } => self.execute_feature(&feature).await,
            other => Reply::failed(format!(
                "unsupported action '{}' for content agent",
                other.action()
            )),
        }
    }
}

impl ContentAgent {
    async fn execute_feature(&self, name: &str) -> Reply {
        let Some(feature) = Feature::from_wire(name) else {
            return Reply::failed("Unknown feature");
        };
        match feature {
            Feature::CalmSummarize => match self.calm_summarize().await {
                Ok(FeatureOutcome::Ready { value, .. }) => Reply::summary(value),
                Ok(FeatureOutcome::Cancelled) => Reply::cancelled(),
                Err(MindfulError::EmptyInput) => Reply::failed("No content found on this page"),
                Err(e) => Reply::failed(e.to_string()),
            },
            Feature::Journal => {
                self.inner.tokens.begin(Feature::Journal.as_str());
                self.inner.presenter.present(View::Feature(feature));
                Reply::ok()
            }
            Feature::Breathe | Feature::BlinkBuddy => {
                self.inner.presenter.present(View::Feature(feature));
                Reply::ok()
            }
        }
    }
}

/// Builder for [`ContentAgent`].
pub struct ContentAgentBuilder {
    store: Arc<dyn KeyValueStore>,
    background: CommandClient,
    extractor: Arc<dyn TextExtractor>,
    presenter: Arc<dyn Presenter>,
    bridge: Option<Arc<PageBridge>>,
    clock: Arc<dyn Clock>,
    drift: DriftConfig,
    calm_summary_cache: CacheConfig,
    usefulness_cache: CacheConfig,
}

impl ContentAgentBuilder {
    /// Page bridge for the in-page tier. Without one that tier is skipped.
    pub fn bridge(mut self, bridge: Arc<PageBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn drift_config(mut self, config: DriftConfig) -> Self {
        self.drift = config;
        self
    }

    /// Default: [`CacheConfig::calm_summary()`].
    pub fn calm_summary_cache(mut self, config: CacheConfig) -> Self {
        self.calm_summary_cache = config;
        self
    }

    /// Default: [`CacheConfig::usefulness()`].
    pub fn usefulness_cache(mut self, config: CacheConfig) -> Self {
        self.usefulness_cache = config;
        self
    }

    pub fn build(self) -> ContentAgent {
        ContentAgent {
            inner: Arc::new(AgentInner {
                settings: Settings::new(self.store.clone()),
                bridge: self.bridge,
                background: self.background,
                summaries: ResultCache::new(
                    self.store.clone(),
                    self.clock.clone(),
                    self.calm_summary_cache,
                ),
                assessments: ResultCache::new(
                    self.store,
                    self.clock.clone(),
                    self.usefulness_cache,
                ),
                tokens: FeatureTokens::new(),
                drift: Mutex::new(DriftDetector::new(self.drift)),
                focus: Mutex::new(Focus::default()),
                extractor: self.extractor,
                presenter: self.presenter,
                clock: self.clock,
            }),
        }
    }
}
