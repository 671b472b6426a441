//! Privileged background service.
//!
//! Owns a [`CapabilityRegistry`] (normally built with the require-`available`
//! policy) and answers `assessUsefulness`, `summarizePage` and
//! `classifyJournalMood` commands. This is the second fallback tier behind
//! the page bridge.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::command::{Command, CommandHandler, Reply};
use crate::providers::CapabilityRegistry;
use crate::text::{Extracted, ensure_bold_highlights, extract_text, truncate_chars};
use crate::types::{CalmSummary, DEFAULT_MOODS, SummaryPipeline};
use crate::{MindfulError, Result};

/// Page text sent to the usefulness prompt.
pub const ASSESS_INPUT_CHARS: usize = 4000;
/// Page text sent to the summarizer.
pub const SUMMARY_INPUT_CHARS: usize = 1800;
/// Page text sent to the language model summary fallback.
pub const PROMPT_SUMMARY_INPUT_CHARS: usize = 3000;

const SUMMARIZER_CONTEXT: &str = "Summarize this webpage for someone feeling overwhelmed. \
     Include key points, data, and cautions.";
const REWRITE_INSTRUCTIONS: &str = "Rewrite this summary in a gentle, compassionate tone. \
     Keep every factual detail. Use short paragraphs. Wrap the most important factual \
     sentences in <strong> tags.";

pub struct BackgroundService {
    registry: Arc<CapabilityRegistry>,
}

impl BackgroundService {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Score a page against the intent; returns the raw assessment text.
    #[instrument(name = "background.assess", skip_all)]
    pub async fn assess_usefulness(
        &self,
        intent: &str,
        page_text: &str,
        page_title: &str,
        page_url: &str,
    ) -> Result<String> {
        if page_text.trim().is_empty() {
            return Err(MindfulError::EmptyInput);
        }
        let session = self.registry.language_model(None).await?;
        let prompt = assessment_prompt(intent, page_title, page_url, page_text);
        let raw = session.prompt(&prompt).await?;
        extract_text(&raw, "output").into_result("assessment prompt")
    }

    /// Calm summary: summarizer + rewriter first, language model second.
    #[instrument(name = "background.summarize", skip_all)]
    pub async fn summarize_page(&self, page_text: &str) -> Result<CalmSummary> {
        if page_text.trim().is_empty() {
            return Err(MindfulError::EmptyInput);
        }

        match self.hybrid_summary(page_text).await {
            Ok(summary) => return Ok(summary),
            Err(e) => {
                warn!(error = %e, "hybrid summarizer unavailable, falling back to language model")
            }
        }

        let session = self.registry.language_model(None).await?;
        let prompt = calm_summary_prompt(truncate_chars(page_text, PROMPT_SUMMARY_INPUT_CHARS));
        let raw = session.prompt(&prompt).await?;
        let text = extract_text(&raw, "output").into_result("summary prompt")?;
        Ok(CalmSummary::new(
            ensure_bold_highlights(text.trim()),
            SummaryPipeline::Prompt,
        ))
    }

    async fn hybrid_summary(&self, page_text: &str) -> Result<CalmSummary> {
        let summarizer = self.registry.summarizer(None).await?;
        let input = truncate_chars(page_text, SUMMARY_INPUT_CHARS);
        let raw = summarizer.summarize(input, SUMMARIZER_CONTEXT).await?;
        let base = extract_text(&raw, "summary").into_result("summarizer")?;

        let (text, pipeline) = match self.rewrite_calmly(&base).await {
            Ok(rewritten) => (rewritten, SummaryPipeline::SummarizerRewriter),
            Err(e) => {
                debug!(error = %e, "rewriter unavailable, using base summary");
                (base, SummaryPipeline::Summarizer)
            }
        };
        Ok(CalmSummary::new(
            ensure_bold_highlights(text.trim()),
            pipeline,
        ))
    }

    async fn rewrite_calmly(&self, summary: &str) -> Result<String> {
        let rewriter = self.registry.rewriter(None).await?;
        let raw = rewriter.rewrite(summary, REWRITE_INSTRUCTIONS).await?;
        let text = extract_text(&raw, "rewritten").into_result("rewriter")?;
        Ok(text.trim().to_string())
    }

    /// Pick one of `moods` (or the defaults) for a journal entry.
    #[instrument(name = "background.classify_mood", skip_all)]
    pub async fn classify_journal_mood(&self, text: &str, moods: &[String]) -> Result<String> {
        if text.trim().is_empty() {
            return Err(MindfulError::EmptyInput);
        }
        let moods = if moods.is_empty() {
            DEFAULT_MOODS.iter().map(|m| m.to_string()).collect()
        } else {
            moods.to_vec()
        };

        let session = self.registry.language_model(None).await?;
        let prompt = format!(
            "Pick the single most appropriate mood from this list: {}.\n\
             Only return the mood word with no punctuation.\n\n\
             Entry:\n\"\"\"\n{text}\n\"\"\"",
            moods.join(", ")
        );
        let raw = session.prompt(&prompt).await?;
        let response = match extract_text(&raw, "output") {
            Extracted::Text(t) => t,
            Extracted::NoExtractableText => String::new(),
        };
        Ok(match_mood(&response, &moods))
    }
}

#[async_trait]
impl CommandHandler for BackgroundService {
    async fn handle(&self, command: Command) -> Reply {
        match command {
            Command::AssessUsefulness {
                intent,
                page_text,
                page_title,
                page_url,
            } => self
                .assess_usefulness(&intent, &page_text, &page_title, &page_url)
                .await
                .map(Reply::assessment)
                .into(),
            Command::SummarizePage { page_text } => self
                .summarize_page(&page_text)
                .await
                .map(Reply::summary)
                .into(),
            Command::ClassifyJournalMood { text, moods } => self
                .classify_journal_mood(&text, &moods)
                .await
                .map(Reply::mood)
                .into(),
            Command::Ping => Reply::ready(),
            other => Reply::failed(format!(
                "unsupported action '{}' for background service",
                other.action()
            )),
        }
    }
}

/// Exact (case-insensitive) match first, then substring, else the first mood.
pub fn match_mood(response: &str, moods: &[String]) -> String {
    let fallback = || {
        moods
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_MOODS[0].to_string())
    };
    let cleaned = response.trim().to_lowercase();
    if cleaned.is_empty() {
        return fallback();
    }
    moods
        .iter()
        .find(|m| m.to_lowercase() == cleaned)
        .or_else(|| moods.iter().find(|m| cleaned.contains(&m.to_lowercase())))
        .cloned()
        .unwrap_or_else(fallback)
}

fn assessment_prompt(intent: &str, title: &str, url: &str, page_text: &str) -> String {
    format!(
        "You are evaluating how useful a web page is for a user's stated goal. The user's input \
         may contain typos; infer the intended meaning.\n\n\
         User goal: \"{intent}\"\n\
         Page title: {title}\n\
         Page URL: {url}\n\n\
         Consider the page type (overview, tutorial, documentation, news, shopping, \
         entertainment, educational video) and whether it directly helps the user make concrete \
         progress toward their goal.\n\n\
         Scoring rubric (0-10):\n\
         - 9-10: Highly on-topic and actionable for the goal.\n\
         - 7-8: On-topic and informative but less actionable or narrowly scoped.\n\
         - 4-6: Tangential, partial relevance, or too shallow to be directly useful.\n\
         - 1-3: Mostly irrelevant, clickbait, or off-topic for the stated goal.\n\
         - 0: Completely unrelated or empty content.\n\n\
         Page content (truncated): {content}\n\n\
         Provide your response in this EXACT format:\n\
         Score: X/10\n\
         Explanation: [1-2 sentences referencing the goal and page type]\n\
         Relevant Information:\n\
         - [Only list bullet points that directly help the user with their goal. If none, write \
         \"No directly relevant points found.\"]\n",
        content = truncate_chars(page_text, ASSESS_INPUT_CHARS),
    )
}

fn calm_summary_prompt(content: &str) -> String {
    format!(
        "You are a gentle, calming assistant helping someone who feels overwhelmed by news or \
         information. Create a soothing summary of the following content that softens harsh \
         information, acknowledges complexity with empathy and does not miss any important \
         information. Wrap the most important factual sentences in <strong> tags.\n\n\
         Content to summarize:\n{content}"
    )
}
