use serde::{Deserialize, Serialize};

/// Which pipeline produced a calm summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryPipeline {
    #[serde(rename = "summarizer")]
    Summarizer,
    /// Summarizer output softened by the rewriter; carries `<strong>` markup.
    #[serde(rename = "summarizer+rewriter")]
    SummarizerRewriter,
    /// General language model prompt.
    #[serde(rename = "prompt")]
    Prompt,
    /// Truncated page text.
    #[serde(rename = "raw")]
    Raw,
}

impl SummaryPipeline {
    /// Whether the summary text may contain trusted inline markup.
    pub fn allows_markup(&self) -> bool {
        matches!(
            self,
            SummaryPipeline::SummarizerRewriter | SummaryPipeline::Prompt
        )
    }
}

/// A calm page summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalmSummary {
    pub text: String,
    pub pipeline: SummaryPipeline,
}

impl CalmSummary {
    pub fn new(text: impl Into<String>, pipeline: SummaryPipeline) -> Self {
        Self {
            text: text.into(),
            pipeline,
        }
    }
}
