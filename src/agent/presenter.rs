use crate::drift::Nudge;
use crate::types::{CalmSummary, Feature, Provenance, UsefulnessAssessment};

/// Something the content agent wants shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    /// Focus bar for the current intent.
    FocusBar { intent: String },
    FocusBarHidden,
    AssessmentLoading,
    /// Progress text while an assessment is computed.
    AssessmentStatus(String),
    Assessment {
        assessment: UsefulnessAssessment,
        provenance: Provenance,
        note: Option<String>,
    },
    /// Nothing readable on the page and nothing saved.
    NoContent,
    SummaryLoading(String),
    SummaryStatus(String),
    /// A saved summary shown while a fresh one is computed.
    SummarySnippet { summary: CalmSummary, when: String },
    Summary {
        summary: CalmSummary,
        provenance: Provenance,
        note: Option<String>,
    },
    Nudge { nudge: Nudge, message: String },
    Refocus { intent: String },
    NudgeSnoozed,
    /// A self-contained feature view (breathing, journal, blink reminder).
    Feature(Feature),
}

/// Renders [`View`]s. Rendering itself is out of this crate's hands.
pub trait Presenter: Send + Sync {
    fn present(&self, view: View);
}

/// Discards everything.
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn present(&self, _view: View) {}
}
