//! Wire types exchanged between the content context and the page.
//!
//! Every message is a flat JSON object:
//!
//! ```json
//! { "source": "mindful-content-script", "type": "CALM_SUMMARY_REQUEST",
//!   "requestId": "mindful-summary-…", "text": "…",
//!   "metadata": { "intent": "…", "title": "…", "url": "…" } }
//! ```
//!
//! Status messages carry `message`; result messages carry `success`,
//! `payload` and `error`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CalmSummary, SummaryPipeline, UsefulnessAssessment};
use crate::{MindfulError, Result};

/// Source tag of messages posted by the content context.
pub const CONTENT_SOURCE: &str = "mindful-content-script";
/// Source tag of messages posted by the page responder.
pub const PAGE_SOURCE: &str = "mindful-page-bridge";

/// Logical request channel. Correlation requires the id *and* the channel
/// to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeChannel {
    Summary,
    Usefulness,
}

impl BridgeChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeChannel::Summary => "summary",
            BridgeChannel::Usefulness => "usefulness",
        }
    }
}

impl fmt::Display for BridgeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bridge envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub source: String,
    pub request_id: String,
    #[serde(flatten)]
    pub message: Message,
}

/// Message body, discriminated by the wire `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "CALM_SUMMARY_REQUEST")]
    SummaryRequest(RequestBody),
    #[serde(rename = "CALM_SUMMARY_STATUS")]
    SummaryStatus(StatusBody),
    #[serde(rename = "CALM_SUMMARY_RESULT")]
    SummaryResult(ResultBody),
    #[serde(rename = "USEFULNESS_ASSESS_REQUEST")]
    UsefulnessRequest(RequestBody),
    #[serde(rename = "USEFULNESS_ASSESS_STATUS")]
    UsefulnessStatus(StatusBody),
    #[serde(rename = "USEFULNESS_ASSESS_RESULT")]
    UsefulnessResult(ResultBody),
}

/// Channel-independent view of a [`Message`].
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Request(RequestBody),
    Status(StatusBody),
    Result(ResultBody),
}

impl Message {
    pub fn request(channel: BridgeChannel, body: RequestBody) -> Self {
        match channel {
            BridgeChannel::Summary => Message::SummaryRequest(body),
            BridgeChannel::Usefulness => Message::UsefulnessRequest(body),
        }
    }

    pub fn status(channel: BridgeChannel, message: impl Into<String>) -> Self {
        let body = StatusBody {
            message: message.into(),
        };
        match channel {
            BridgeChannel::Summary => Message::SummaryStatus(body),
            BridgeChannel::Usefulness => Message::UsefulnessStatus(body),
        }
    }

    pub fn result(channel: BridgeChannel, body: ResultBody) -> Self {
        match channel {
            BridgeChannel::Summary => Message::SummaryResult(body),
            BridgeChannel::Usefulness => Message::UsefulnessResult(body),
        }
    }

    pub fn channel(&self) -> BridgeChannel {
        match self {
            Message::SummaryRequest(_) | Message::SummaryStatus(_) | Message::SummaryResult(_) => {
                BridgeChannel::Summary
            }
            Message::UsefulnessRequest(_)
            | Message::UsefulnessStatus(_)
            | Message::UsefulnessResult(_) => BridgeChannel::Usefulness,
        }
    }

    pub fn into_body(self) -> Body {
        match self {
            Message::SummaryRequest(b) | Message::UsefulnessRequest(b) => Body::Request(b),
            Message::SummaryStatus(b) | Message::UsefulnessStatus(b) => Body::Status(b),
            Message::SummaryResult(b) | Message::UsefulnessResult(b) => Body::Result(b),
        }
    }
}

impl Envelope {
    pub fn new(source: &str, request_id: impl Into<String>, message: Message) -> Self {
        Self {
            source: source.to_string(),
            request_id: request_id.into(),
            message,
        }
    }

    /// Decode a raw posted value. `None` for anything that is not a
    /// well-formed envelope.
    pub fn decode(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    pub fn encode(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub text: String,
    #[serde(default)]
    pub metadata: RequestMetadata,
}

/// Page context sent along with a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusBody {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBody {
    pub success: bool,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ResultBody {
    pub fn ok(payload: Value) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Result payloads
// ============================================================================

/// Payload of a successful summary result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub summary: String,
    pub mode: SummaryPipeline,
    #[serde(default)]
    pub metadata: SummaryMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetadata {
    #[serde(default)]
    pub availability_checked: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

impl SummaryPayload {
    pub fn from_value(value: Value) -> Result<Self> {
        let payload: Self = serde_json::from_value(value)
            .map_err(|e| MindfulError::MalformedResponse(format!("summary payload: {e}")))?;
        if payload.summary.trim().is_empty() {
            return Err(MindfulError::MalformedResponse(
                "summary payload is empty".to_string(),
            ));
        }
        Ok(payload)
    }

    pub fn into_summary(self) -> CalmSummary {
        CalmSummary::new(self.summary, self.mode)
    }
}

/// Payload of a successful usefulness result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsefulnessPayload {
    /// Canonical assessment text.
    pub assessment_text: String,
    #[serde(default)]
    pub numeric_score: Option<f64>,
    pub mode: String,
}

impl UsefulnessPayload {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| MindfulError::MalformedResponse(format!("usefulness payload: {e}")))
    }

    pub fn from_assessment(assessment: &UsefulnessAssessment) -> Self {
        Self {
            assessment_text: assessment.to_text(),
            numeric_score: assessment.score.map(f64::from),
            mode: "prompt".to_string(),
        }
    }
}
