use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use super::Port;
use super::envelope::{
    Body, BridgeChannel, CONTENT_SOURCE, Envelope, Message, PAGE_SOURCE, RequestBody, ResultBody,
    SummaryMetadata, SummaryPayload, UsefulnessPayload,
};
use crate::providers::CapabilityRegistry;
use crate::text::{extract_text, strip_code_fences, truncate_chars};
use crate::types::{DownloadMonitor, DownloadProgress, SummaryPipeline, UsefulnessAssessment};
use crate::{MindfulError, Result};

/// Page text sent to the scoring prompt.
const USEFULNESS_PROMPT_CHARS: usize = 3500;

const SUMMARIZER_CONTEXT_WITH_GOAL: &str = "Use gentle, reassuring language.";
const SUMMARIZER_CONTEXT: &str = "Use a gentle, reassuring tone and include key facts.";
const REWRITE_INSTRUCTIONS: &str = "Rewrite this summary in a gentle, compassionate tone. \
     Keep every factual detail. Use short paragraphs. Wrap the most important factual \
     sentences in <strong> tags.";

/// Page-side end of the bridge.
///
/// Answers summary and usefulness requests with the page's own capability
/// registry, which is usually built with downloads allowed. Each request is
/// handled in its own task; status messages for one request are posted in
/// order.
pub struct PageResponder {
    registry: Arc<CapabilityRegistry>,
    outbound: mpsc::UnboundedSender<Value>,
}

impl PageResponder {
    /// Start answering requests arriving on the page side of a window.
    pub fn spawn(registry: Arc<CapabilityRegistry>, port: Port) -> JoinHandle<()> {
        let (outbound, inbound) = port.into_parts();
        let responder = Arc::new(Self { registry, outbound });

        tokio::spawn(async move {
            let mut messages = UnboundedReceiverStream::new(inbound);
            while let Some(raw) = messages.next().await {
                let Some(envelope) = Envelope::decode(raw) else {
                    debug!("dropping malformed bridge message");
                    continue;
                };
                if envelope.source != CONTENT_SOURCE {
                    continue;
                }
                let responder = responder.clone();
                tokio::spawn(async move { responder.handle(envelope).await });
            }
            debug!("page responder stopped");
        })
    }

    async fn handle(&self, envelope: Envelope) {
        let channel = envelope.message.channel();
        let request_id = envelope.request_id;
        let Body::Request(request) = envelope.message.into_body() else {
            return;
        };

        let result = match channel {
            BridgeChannel::Summary => self.summarize(&request_id, request).await,
            BridgeChannel::Usefulness => self.assess(&request_id, request).await,
        };
        let body = match result {
            Ok(payload) => ResultBody::ok(payload),
            Err(e) => {
                warn!(%request_id, %channel, error = %e, "page request failed");
                ResultBody::failed(e.to_string())
            }
        };
        self.post(&request_id, Message::result(channel, body));
    }

    async fn summarize(&self, request_id: &str, request: RequestBody) -> Result<Value> {
        let RequestBody { text, metadata } = request;
        if text.trim().is_empty() {
            return Err(MindfulError::InvalidInput(
                "No text provided for summarization.".to_string(),
            ));
        }

        self.status(request_id, BridgeChannel::Summary, "Checking built-in AI availability…");
        let summarizer = self
            .registry
            .summarizer(Some(self.progress_monitor(request_id, BridgeChannel::Summary)))
            .await?;

        self.status(request_id, BridgeChannel::Summary, "Generating quick overview…");
        let context = if metadata.intent.is_empty() {
            SUMMARIZER_CONTEXT.to_string()
        } else {
            format!("User goal: {}. {SUMMARIZER_CONTEXT_WITH_GOAL}", metadata.intent)
        };
        let raw = summarizer.summarize(&text, &context).await?;
        let base = extract_text(&raw, "summary").into_result("summarizer")?;

        let (summary, mode) = match self.soften(request_id, &base).await {
            Ok(softened) => (softened, SummaryPipeline::SummarizerRewriter),
            Err(e) => {
                self.status(
                    request_id,
                    BridgeChannel::Summary,
                    format!("Rewriter unavailable ({e}). Using summarizer result."),
                );
                (base, SummaryPipeline::Summarizer)
            }
        };

        let payload = SummaryPayload {
            summary,
            mode,
            metadata: SummaryMetadata {
                availability_checked: true,
                title: metadata.title,
                url: metadata.url,
            },
        };
        Ok(serde_json::to_value(payload)?)
    }

    async fn soften(&self, request_id: &str, summary: &str) -> Result<String> {
        self.status(request_id, BridgeChannel::Summary, "Softening tone for calm delivery…");
        let rewriter = self.registry.rewriter(None).await?;
        let raw = rewriter.rewrite(summary, REWRITE_INSTRUCTIONS).await?;
        extract_text(&raw, "rewritten").into_result("rewriter")
    }

    async fn assess(&self, request_id: &str, request: RequestBody) -> Result<Value> {
        let RequestBody { text, metadata } = request;
        if text.trim().is_empty() {
            return Err(MindfulError::InvalidInput(
                "No content provided for assessment.".to_string(),
            ));
        }

        self.status(request_id, BridgeChannel::Usefulness, "Preparing quick assessment…");
        let session = self
            .registry
            .language_model(Some(
                self.progress_monitor(request_id, BridgeChannel::Usefulness),
            ))
            .await?;

        self.status(request_id, BridgeChannel::Usefulness, "Reviewing page content…");
        let prompt = format!(
            "You are evaluating how useful a web page is for a user's goal.\n\n\
             User goal: \"{intent}\"\n\
             Page title: {title}\n\
             Page URL: {url}\n\n\
             Assess the usefulness scored from 0-10 where 10 is highly useful. Focus on helping \
             the user accomplish their goal. Consider if the content is educational, actionable, \
             or closely aligned with the goal. If not, explain why.\n\n\
             Return ONLY valid JSON with this schema:\n\
             {{\n  \"score\": <number 0-10>,\n  \"explanation\": \"<short explanation>\",\n  \
             \"relevant\": [\"<bullet point>\", \"...\"]\n}}\n\n\
             Page content (truncated):\n{content}\n",
            intent = metadata.intent,
            title = metadata.title,
            url = metadata.url,
            content = truncate_chars(&text, USEFULNESS_PROMPT_CHARS),
        );
        let raw = session.prompt(&prompt).await?;
        let output = extract_text(&raw, "output").into_result("prompt")?;

        let parsed: Value = serde_json::from_str(&strip_code_fences(&output)).map_err(|_| {
            MindfulError::MalformedResponse(
                "Unable to parse Prompt API response as JSON.".to_string(),
            )
        })?;
        let assessment = UsefulnessAssessment::from_json(&parsed)?;
        Ok(serde_json::to_value(UsefulnessPayload::from_assessment(
            &assessment,
        ))?)
    }

    fn progress_monitor(&self, request_id: &str, channel: BridgeChannel) -> DownloadMonitor {
        let outbound = self.outbound.clone();
        let request_id = request_id.to_string();
        Arc::new(move |progress: DownloadProgress| {
            post(
                &outbound,
                &request_id,
                Message::status(channel, progress.status_line()),
            );
        })
    }

    fn status(&self, request_id: &str, channel: BridgeChannel, message: impl Into<String>) {
        self.post(request_id, Message::status(channel, message));
    }

    fn post(&self, request_id: &str, message: Message) {
        post(&self.outbound, request_id, message);
    }
}

fn post(outbound: &mpsc::UnboundedSender<Value>, request_id: &str, message: Message) {
    let envelope = Envelope::new(PAGE_SOURCE, request_id, message);
    match envelope.encode() {
        Ok(value) => {
            if outbound.send(value).is_err() {
                debug!(%request_id, "content side gone, dropping message");
            }
        }
        Err(e) => warn!(%request_id, error = %e, "failed to encode bridge message"),
    }
}

