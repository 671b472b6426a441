//! Text helpers shared by both contexts.
//!
//! The most important piece is [`extract_text`]: capability sessions return
//! loosely shaped JSON, and this decoder picks the text out of it using a
//! fixed priority over the shapes seen in practice.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::{MindfulError, Result};

/// Outcome of decoding a capability session's raw output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Text(String),
    /// None of the known shapes carried non-blank text.
    NoExtractableText,
}

impl Extracted {
    /// Convert into a result, naming the operation in the error.
    pub fn into_result(self, operation: &str) -> Result<String> {
        match self {
            Extracted::Text(text) => Ok(text),
            Extracted::NoExtractableText => Err(MindfulError::MalformedResponse(format!(
                "{operation} returned no extractable text"
            ))),
        }
    }
}

/// Decode text from a raw session output.
///
/// Shapes are tried in this order:
///
/// 1. a bare string
/// 2. `{ <preferred_key>: string }`
/// 3. `{ output: string }`
/// 4. `{ result: string }`
/// 5. `{ results: [first, ..] }`, decoding `first` recursively
/// 6. `{ text: string }`
///
/// Blank strings count as absent.
pub fn extract_text(output: &Value, preferred_key: &str) -> Extracted {
    match output {
        Value::String(s) => non_blank(s),
        Value::Object(map) => {
            for key in [preferred_key, "output", "result"] {
                if let Some(Value::String(s)) = map.get(key)
                    && let Extracted::Text(text) = non_blank(s)
                {
                    return Extracted::Text(text);
                }
            }
            if let Some(Value::Array(results)) = map.get("results")
                && let Some(first) = results.first()
                && let Extracted::Text(text) = extract_text(first, preferred_key)
            {
                return Extracted::Text(text);
            }
            match map.get("text") {
                Some(Value::String(s)) => non_blank(s),
                _ => Extracted::NoExtractableText,
            }
        }
        _ => Extracted::NoExtractableText,
    }
}

fn non_blank(s: &str) -> Extracted {
    if s.trim().is_empty() {
        Extracted::NoExtractableText
    } else {
        Extracted::Text(s.to_string())
    }
}

/// Truncate to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

static RUNS_OF_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static RUNS_OF_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Default upper bound on extracted page text.
pub const MAX_EXTRACTED_CHARS: usize = 8000;

/// Normalise scraped page text: non-breaking spaces become spaces, line
/// endings become `\n`, blank-line runs collapse to one blank line and space
/// runs to one space. The result is trimmed and capped at `max_chars`.
pub fn sanitize_extracted(text: &str, max_chars: usize) -> String {
    let normalized = text.replace('\u{a0}', " ").replace("\r\n", "\n");
    let normalized = RUNS_OF_BLANK_LINES.replace_all(&normalized, "\n\n");
    let normalized = RUNS_OF_SPACES.replace_all(&normalized, " ");
    truncate_chars(normalized.trim(), max_chars).to_string()
}

/// A single-line preview of `text`, ellipsised past `max_chars`.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let collapsed = WHITESPACE.replace_all(text.trim(), " ");
    if collapsed.chars().count() > max_chars {
        format!("{}…", truncate_chars(&collapsed, max_chars).trim_end())
    } else {
        collapsed.into_owned()
    }
}

/// Remove markdown code fences a model may wrap JSON in.
pub fn strip_code_fences(text: &str) -> String {
    static FENCE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)```(?:json)?").expect("valid regex"));
    FENCE.replace_all(text, "").trim().to_string()
}

static MARKDOWN_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\*\*(.+?)\*\*").expect("valid regex"));
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?])\s+").expect("valid regex"));
static KEY_SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d|\bkey\b|\bimportant\b|\bfact\b)").expect("valid regex"));

/// Convert `**bold**` markdown into `<strong>` tags.
pub fn markdown_bold_to_strong(text: &str) -> String {
    if !text.contains("**") {
        return text.to_string();
    }
    MARKDOWN_BOLD
        .replace_all(text, |caps: &regex::Captures<'_>| {
            format!("<strong>{}</strong>", caps[1].trim())
        })
        .into_owned()
}

/// Make sure a summary carries at least one `<strong>` highlight.
///
/// Markdown bold is converted first. If that yields no highlight, the first
/// sentence and every sentence mentioning a number or the words "key",
/// "important" or "fact" are wrapped.
pub fn ensure_bold_highlights(summary: &str) -> String {
    if summary.trim().is_empty() {
        return summary.to_string();
    }
    let normalised = markdown_bold_to_strong(summary);
    if normalised.to_lowercase().contains("<strong>") {
        return normalised;
    }
    let sentences = split_sentences(&normalised);
    if sentences.is_empty() {
        return format!("<strong>{normalised}</strong>");
    }
    sentences
        .iter()
        .enumerate()
        .map(|(index, sentence)| {
            if index == 0 || KEY_SENTENCE.is_match(sentence) {
                format!("<strong>{}</strong>", sentence.trim())
            } else {
                sentence.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split after sentence-ending punctuation followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for caps in SENTENCE_BREAK.captures_iter(text) {
        let (Some(whole), Some(punct)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let sentence = &text[start..punct.end()];
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = whole.end();
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}
