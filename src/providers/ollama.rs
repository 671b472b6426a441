//! Ollama-backed capability provider.
//!
//! One local model serves all three capabilities; the session kinds differ
//! only in the system instruction they send.
//!
//! - availability: `GET /api/tags` (model listed → available, else downloadable)
//! - download: streaming `POST /api/pull`, progress forwarded to the monitor
//! - generation: `POST /api/generate` with `stream: false`
//!
//! See: <https://github.com/ollama/ollama/blob/main/docs/api.md>

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::retry::{RetryConfig, with_retry};
use super::traits::{CapabilityFactory, LanguageModelSession, RewriterSession, SummarizerSession};
use crate::types::{Availability, DownloadMonitor, DownloadProgress};
use crate::{MindfulError, Result};

/// Default base URL of a local Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default model.
pub const DEFAULT_MODEL: &str = "llama3.2";

const SUMMARIZER_SYSTEM: &str = "You summarize web pages. Reply with a short plain-text \
     overview of the key points and nothing else.";
const REWRITER_SYSTEM: &str = "You rewrite text. Keep the meaning, follow the instructions, \
     and reply with the rewritten text only.";

/// Client for an Ollama server, usable as summarizer, rewriter and language
/// model factory.
#[derive(Clone)]
pub struct OllamaProvider {
    http: Client,
    base_url: String,
    model: String,
    retry: RetryConfig,
}

impl OllamaProvider {
    /// Create a provider against the default local server.
    pub fn new(model: impl Into<String>) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, model)
    }

    /// Create a provider with a custom base URL (for testing with wiremock).
    pub fn with_base_url(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| MindfulError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            retry: RetryConfig::default(),
        })
    }

    /// Retry policy for generation calls. Default: [`RetryConfig::default()`].
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the configured model is already pulled.
    pub async fn model_present(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| MindfulError::Http(e.to_string()))?;
        let response = check_status(response).await?;

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| MindfulError::MalformedResponse(format!("tags response: {e}")))?;

        let tagged = format!("{}:latest", self.model);
        Ok(tags
            .models
            .iter()
            .any(|m| m.name == self.model || m.name == tagged))
    }

    /// Pull the model, forwarding progress ticks to `monitor`.
    pub async fn pull(&self, monitor: Option<DownloadMonitor>) -> Result<()> {
        info!(model = %self.model, "pulling model");
        let url = format!("{}/api/pull", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&PullRequest {
                model: &self.model,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| MindfulError::Http(e.to_string()))?;
        let response = check_status(response).await?;

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MindfulError::Http(e.to_string()))?;
            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                handle_pull_line(&line, monitor.as_ref())?;
            }
        }
        if !buffer.is_empty() {
            handle_pull_line(&buffer, monitor.as_ref())?;
        }
        Ok(())
    }

    /// Run one non-streaming generation and return the response text.
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<Value> {
        with_retry(&self.retry, "ollama", "generate", || {
            self.generate_once(prompt, system)
        })
        .await
    }

    async fn generate_once(&self, prompt: &str, system: Option<&str>) -> Result<Value> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                system,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| MindfulError::Http(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(MindfulError::CapabilityUnavailable(format!(
                "model {} not found on server",
                self.model
            )));
        }
        let response = check_status(response).await?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| MindfulError::MalformedResponse(format!("generate response: {e}")))?;
        debug!(model = %self.model, chars = body.response.len(), "generation finished");
        Ok(Value::String(body.response))
    }

    async fn ensure_model(&self, monitor: Option<DownloadMonitor>) -> Result<()> {
        if !self.model_present().await? {
            self.pull(monitor).await?;
        }
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(MindfulError::Http(format!("{status}: {body}")))
    } else {
        Err(MindfulError::RemoteError(format!("{status}: {body}")))
    }
}

fn handle_pull_line(line: &[u8], monitor: Option<&DownloadMonitor>) -> Result<()> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }
    let event: PullEvent = serde_json::from_str(text)
        .map_err(|e| MindfulError::MalformedResponse(format!("pull progress: {e}")))?;
    if let Some(error) = event.error {
        return Err(MindfulError::InitializationFailed(format!("pull failed: {error}")));
    }
    if let (Some(monitor), Some(total), Some(completed)) = (monitor, event.total, event.completed)
        && total > 0
    {
        monitor(DownloadProgress {
            loaded: Some(completed as f64 / total as f64),
        });
    }
    Ok(())
}

// ============================================================================
// Factories and sessions
// ============================================================================

#[async_trait]
impl CapabilityFactory<dyn SummarizerSession> for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn availability(&self) -> Result<Availability> {
        availability(self).await
    }

    async fn create(&self, monitor: Option<DownloadMonitor>) -> Result<Arc<dyn SummarizerSession>> {
        self.ensure_model(monitor).await?;
        Ok(Arc::new(OllamaSession(self.clone())))
    }
}

#[async_trait]
impl CapabilityFactory<dyn RewriterSession> for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn availability(&self) -> Result<Availability> {
        availability(self).await
    }

    async fn create(&self, monitor: Option<DownloadMonitor>) -> Result<Arc<dyn RewriterSession>> {
        self.ensure_model(monitor).await?;
        Ok(Arc::new(OllamaSession(self.clone())))
    }
}

#[async_trait]
impl CapabilityFactory<dyn LanguageModelSession> for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn availability(&self) -> Result<Availability> {
        availability(self).await
    }

    async fn create(
        &self,
        monitor: Option<DownloadMonitor>,
    ) -> Result<Arc<dyn LanguageModelSession>> {
        self.ensure_model(monitor).await?;
        Ok(Arc::new(OllamaSession(self.clone())))
    }
}

async fn availability(provider: &OllamaProvider) -> Result<Availability> {
    if provider.model_present().await? {
        Ok(Availability::Available)
    } else {
        Ok(Availability::Downloadable)
    }
}

/// A session over an [`OllamaProvider`]; stateless apart from the client.
struct OllamaSession(OllamaProvider);

#[async_trait]
impl SummarizerSession for OllamaSession {
    async fn summarize(&self, input: &str, context: &str) -> Result<Value> {
        let prompt = if context.is_empty() {
            input.to_string()
        } else {
            format!("{context}\n\n{input}")
        };
        self.0.generate(&prompt, Some(SUMMARIZER_SYSTEM)).await
    }
}

#[async_trait]
impl RewriterSession for OllamaSession {
    async fn rewrite(&self, input: &str, instructions: &str) -> Result<Value> {
        let prompt = format!("Instructions: {instructions}\n\nText:\n{input}");
        self.0.generate(&prompt, Some(REWRITER_SYSTEM)).await
    }
}

#[async_trait]
impl LanguageModelSession for OllamaSession {
    async fn prompt(&self, input: &str) -> Result<Value> {
        self.0.generate(input, None).await
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct PullEvent {
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}
