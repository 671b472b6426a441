use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{MindfulError, Result};

/// Placeholder used when an assessment lists no relevant points.
pub const NO_RELEVANT_POINTS: &str = "No directly relevant points found.";

/// Explanation used when an assessment carries none.
const NO_EXPLANATION: &str = "No explanation provided.";

/// Score shown when every tier failed and no saved result exists.
pub(crate) const DEGRADED_SCORE: u8 = 7;

static SCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Score:\s*(\d+)\s*/\s*10").expect("valid regex"));
static EXPLANATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Explanation:\s*(.+?)(?:\nRelevant|$)").expect("valid regex")
});
static RELEVANT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Relevant Information:\s*(.+?)(?:\n\n|\n*$)").expect("valid regex")
});

/// A page usefulness assessment against the browsing intent.
///
/// The canonical text form is what gets cached and what the background
/// context returns:
///
/// ```text
/// Score: 8/10
/// Explanation: A tutorial that covers the goal directly.
/// Relevant Information:
/// - Step-by-step setup
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsefulnessAssessment {
    /// Integer score in `[0, 10]`; `None` when the text carried no score.
    pub score: Option<u8>,
    pub explanation: String,
    /// Relevant points; a single [`NO_RELEVANT_POINTS`] entry when none.
    pub relevant: Vec<String>,
}

impl UsefulnessAssessment {
    /// Parse the canonical text form.
    ///
    /// Missing sections degrade to defaults; only blank input and input
    /// with none of the three sections are rejected.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(MindfulError::EmptyInput);
        }

        let score = SCORE
            .captures(trimmed)
            .and_then(|c| c[1].parse::<u32>().ok())
            .map(|s| s.min(10) as u8);
        let explanation = EXPLANATION.captures(trimmed).map(|c| c[1].trim().to_string());
        let relevant_block = RELEVANT.captures(trimmed).map(|c| c[1].to_string());

        if score.is_none() && explanation.is_none() && relevant_block.is_none() {
            return Err(MindfulError::MalformedResponse(
                "assessment has no score, explanation or relevant section".to_string(),
            ));
        }

        let points = relevant_block
            .as_deref()
            .map(|block| {
                block
                    .lines()
                    .map(str::trim)
                    .filter_map(|line| line.strip_prefix('-'))
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(Self {
            score,
            explanation: explanation
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "Unable to assess this page right now.".to_string()),
            relevant: with_placeholder(points),
        })
    }

    /// Build from the JSON shape `{score, explanation, relevant[]}` a prompt
    /// session is asked to return.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(MindfulError::MalformedResponse(
                "assessment payload is not an object".to_string(),
            ));
        };

        let score = match map.get("score") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|f| f.is_finite())
        .map(|f| f.clamp(0.0, 10.0).round() as u8);

        let explanation = match map.get("explanation") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => NO_EXPLANATION.to_string(),
        };

        let points = match map.get("relevant") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                })
                .filter(|s| !s.is_empty())
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            score,
            explanation,
            relevant: with_placeholder(points),
        })
    }

    /// Fixed-score result used when no tier produced an assessment.
    pub fn degraded(intent: &str) -> Self {
        Self {
            score: Some(DEGRADED_SCORE),
            explanation: format!(
                "This page appears to contain relevant information. \
                 Consider if it directly supports your goal: \"{intent}\""
            ),
            relevant: vec![
                "AI assessment unavailable. Please review the page content manually.".to_string(),
            ],
        }
    }

    /// Whether the relevant list is only the placeholder.
    pub fn has_relevant_points(&self) -> bool {
        !(self.relevant.len() == 1 && self.relevant[0] == NO_RELEVANT_POINTS)
    }

    pub fn band(&self) -> ScoreBand {
        self.score.map(ScoreBand::from_score).unwrap_or(ScoreBand::Medium)
    }

    /// Canonical text form (see type docs).
    pub fn to_text(&self) -> String {
        let score = self
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let bullets = self
            .relevant
            .iter()
            .map(|p| format!("- {p}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Score: {score}/10\nExplanation: {}\nRelevant Information:\n{bullets}",
            self.explanation
        )
    }
}

impl fmt::Display for UsefulnessAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

fn with_placeholder(points: Vec<String>) -> Vec<String> {
    if points.is_empty() {
        vec![NO_RELEVANT_POINTS.to_string()]
    } else {
        points
    }
}

/// Coarse banding of a score for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    High,
    Medium,
    Low,
}

impl ScoreBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            8.. => ScoreBand::High,
            5..=7 => ScoreBand::Medium,
            _ => ScoreBand::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_canonical_text() {
        let text = "Score: 9/10\nExplanation: Directly on topic.\nRelevant Information:\n- Light reactions\n- Calvin cycle";
        let parsed = UsefulnessAssessment::parse(text).unwrap();
        assert_eq!(parsed.score, Some(9));
        assert_eq!(parsed.explanation, "Directly on topic.");
        assert_eq!(parsed.relevant, vec!["Light reactions", "Calvin cycle"]);
        assert_eq!(parsed.band(), ScoreBand::High);
    }

    #[test]
    fn missing_points_yield_placeholder() {
        let parsed =
            UsefulnessAssessment::parse("Score: 2/10\nExplanation: Shopping page.").unwrap();
        assert_eq!(parsed.relevant, vec![NO_RELEVANT_POINTS]);
        assert!(!parsed.has_relevant_points());
    }

    #[test]
    fn out_of_range_score_is_clamped() {
        let parsed = UsefulnessAssessment::parse("Score: 15/10").unwrap();
        assert_eq!(parsed.score, Some(10));
    }

    #[test]
    fn rejects_blank_and_shapeless_text() {
        assert_eq!(
            UsefulnessAssessment::parse("  "),
            Err(MindfulError::EmptyInput)
        );
        assert!(matches!(
            UsefulnessAssessment::parse("I cannot help with that."),
            Err(MindfulError::MalformedResponse(_))
        ));
    }

    #[test]
    fn from_json_clamps_and_defaults() {
        let parsed = UsefulnessAssessment::from_json(&json!({
            "score": 12.4,
            "relevant": ["  a  ", ""]
        }))
        .unwrap();
        assert_eq!(parsed.score, Some(10));
        assert_eq!(parsed.explanation, NO_EXPLANATION);
        assert_eq!(parsed.relevant, vec!["a"]);

        assert!(UsefulnessAssessment::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn text_form_parses_back() {
        let original = UsefulnessAssessment {
            score: Some(4),
            explanation: "Partly relevant.".into(),
            relevant: vec!["One point".into()],
        };
        assert_eq!(UsefulnessAssessment::parse(&original.to_text()).unwrap(), original);
    }

    #[test]
    fn bands() {
        assert_eq!(ScoreBand::from_score(8), ScoreBand::High);
        assert_eq!(ScoreBand::from_score(5), ScoreBand::Medium);
        assert_eq!(ScoreBand::from_score(4), ScoreBand::Low);
    }
}
