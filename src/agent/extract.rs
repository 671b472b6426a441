//! Page text extraction.
//!
//! A [`LayeredExtractor`] tries site-specific sources whose host pattern
//! matches the page, then a generic source. A result shorter than
//! [`MIN_USEFUL_CHARS`] is kept only as a last resort.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use crate::text::{MAX_EXTRACTED_CHARS, sanitize_extracted};
use crate::types::PageSnapshot;
use crate::{MindfulError, Result};

/// Extracted text shorter than this is considered incomplete.
pub const MIN_USEFUL_CHARS: usize = 80;

static HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://([^/:?#]+)").expect("valid regex"));

/// Produces a snapshot of the page currently shown.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn snapshot(&self) -> PageSnapshot;
}

/// Raw page text from one place (a DOM region, a file, a fixed string).
pub trait TextSource: Send + Sync {
    fn raw_text(&self) -> String;
}

/// Fixed text, e.g. read from a file.
#[derive(Debug, Clone)]
pub struct StaticText(pub String);

impl TextSource for StaticText {
    fn raw_text(&self) -> String {
        self.0.clone()
    }
}

impl<F> TextSource for F
where
    F: Fn() -> String + Send + Sync,
{
    fn raw_text(&self) -> String {
        self()
    }
}

/// Host of an absolute URL, lowercased.
pub fn host_of(url: &str) -> Option<String> {
    HOST.captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

struct SiteSource {
    host: Regex,
    source: Arc<dyn TextSource>,
}

pub struct LayeredExtractor {
    url: String,
    title: String,
    sites: Vec<SiteSource>,
    generic: Arc<dyn TextSource>,
}

impl LayeredExtractor {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        generic: Arc<dyn TextSource>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            sites: Vec::new(),
            generic,
        }
    }

    /// Add a source tried first on hosts matching `host_pattern`.
    pub fn site(mut self, host_pattern: &str, source: Arc<dyn TextSource>) -> Result<Self> {
        let host = Regex::new(host_pattern)
            .map_err(|e| MindfulError::Configuration(format!("bad host pattern: {e}")))?;
        self.sites.push(SiteSource { host, source });
        Ok(self)
    }

    pub fn extract_text(&self) -> String {
        let host = host_of(&self.url).unwrap_or_default();
        let mut fallback = String::new();

        for site in self.sites.iter().filter(|s| s.host.is_match(&host)) {
            let text = sanitize_extracted(&site.source.raw_text(), MAX_EXTRACTED_CHARS);
            if text.chars().count() >= MIN_USEFUL_CHARS {
                return text;
            }
            if fallback.is_empty() {
                fallback = text;
            }
        }

        let generic = sanitize_extracted(&self.generic.raw_text(), MAX_EXTRACTED_CHARS);
        if generic.chars().count() >= MIN_USEFUL_CHARS || fallback.is_empty() {
            generic
        } else {
            fallback
        }
    }
}

#[async_trait]
impl TextExtractor for LayeredExtractor {
    async fn snapshot(&self) -> PageSnapshot {
        PageSnapshot::new(&self.url, &self.title, self.extract_text())
    }
}

#[async_trait]
impl TextExtractor for PageSnapshot {
    async fn snapshot(&self) -> PageSnapshot {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long(word: &str) -> StaticText {
        StaticText(format!("{word} ").repeat(30))
    }

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("https://www.YouTube.com/watch?v=1").as_deref(), Some("www.youtube.com"));
        assert_eq!(host_of("not a url"), None);
    }

    #[test]
    fn site_source_wins_when_long_enough() {
        let extractor = LayeredExtractor::new(
            "https://en.wikipedia.org/wiki/Rust",
            "Rust",
            Arc::new(long("generic")),
        )
        .site(r"(?:^|\.)wikipedia\.org$", Arc::new(long("article")))
        .unwrap();
        assert!(extractor.extract_text().starts_with("article"));
    }

    #[test]
    fn short_site_text_is_last_resort() {
        let extractor = LayeredExtractor::new(
            "https://www.reddit.com/r/rust",
            "",
            Arc::new(StaticText(String::new())),
        )
        .site(r"(?:^|\.)reddit\.com$", Arc::new(StaticText("short post".to_string())))
        .unwrap();
        assert_eq!(extractor.extract_text(), "short post");

        let generic = LayeredExtractor::new(
            "https://www.reddit.com/r/rust",
            "",
            Arc::new(long("generic")),
        )
        .site(r"(?:^|\.)reddit\.com$", Arc::new(StaticText("short post".to_string())))
        .unwrap();
        assert!(generic.extract_text().starts_with("generic"));
    }

    #[test]
    fn unmatched_sites_are_skipped() {
        let extractor = LayeredExtractor::new(
            "https://example.com",
            "",
            Arc::new(|| "  body\u{a0}text  ".to_string()),
        )
        .site(r"(?:^|\.)quora\.com$", Arc::new(long("quora")))
        .unwrap();
        assert_eq!(extractor.extract_text(), "body text");
    }
}
