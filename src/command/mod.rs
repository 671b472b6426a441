//! Command channel between contexts.
//!
//! Contexts that are not connected by the page bridge (popup, content agent,
//! background service) exchange [`Command`]s and [`Reply`]s. A
//! [`CommandHandler`] is served by [`channel()`], which hands back a
//! cloneable [`CommandClient`].
//!
//! Wire form mirrors the runtime messages the handlers were designed
//! against: a JSON object tagged by `action`, with camelCase fields.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::providers::RetryConfig;
use crate::providers::retry::with_retry;
use crate::types::{CalmSummary, Mode, SummaryPipeline};
use crate::{MindfulError, Result};

/// Requests understood by the background service and the content agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    Ping,
    #[serde(rename_all = "camelCase")]
    AssessUsefulness {
        intent: String,
        page_text: String,
        #[serde(default)]
        page_title: String,
        #[serde(default)]
        page_url: String,
    },
    #[serde(rename_all = "camelCase")]
    SummarizePage { page_text: String },
    ClassifyJournalMood {
        text: String,
        #[serde(default)]
        moods: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    ExecuteFeature {
        feature: String,
        #[serde(default)]
        mode: Option<Mode>,
        #[serde(default)]
        browsing_intent: String,
    },
    UpdateIntent { intent: String, mode: Mode },
}

impl Command {
    /// Wire name of the action.
    pub fn action(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::AssessUsefulness { .. } => "assessUsefulness",
            Command::SummarizePage { .. } => "summarizePage",
            Command::ClassifyJournalMood { .. } => "classifyJournalMood",
            Command::ExecuteFeature { .. } => "executeFeature",
            Command::UpdateIntent { .. } => "updateIntent",
        }
    }
}

/// Reply to a [`Command`]: `{success, ...}` or `{success: false, error}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Pipeline that produced `summary`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SummaryPipeline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when a newer request superseded this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn ready() -> Self {
        Self {
            ready: Some(true),
            ..Self::ok()
        }
    }

    pub fn assessment(text: impl Into<String>) -> Self {
        Self {
            assessment: Some(text.into()),
            ..Self::ok()
        }
    }

    pub fn summary(summary: CalmSummary) -> Self {
        Self {
            summary: Some(summary.text),
            mode: Some(summary.pipeline),
            ..Self::ok()
        }
    }

    /// The calm summary carried by a `summarizePage` reply.
    pub fn into_summary(self) -> Option<CalmSummary> {
        let pipeline = self.mode.unwrap_or(SummaryPipeline::Prompt);
        self.summary
            .filter(|s| !s.trim().is_empty())
            .map(|text| CalmSummary::new(text, pipeline))
    }

    pub fn mood(mood: impl Into<String>) -> Self {
        Self {
            mood: Some(mood.into()),
            ..Self::ok()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn cancelled() -> Self {
        Self {
            success: false,
            cancelled: Some(true),
            ..Self::default()
        }
    }

    /// Turn an unsuccessful reply into a `RemoteError`.
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(MindfulError::RemoteError(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

impl From<Result<Reply>> for Reply {
    fn from(result: Result<Reply>) -> Self {
        result.unwrap_or_else(|e| Reply::failed(e.to_string()))
    }
}

/// Something that answers commands.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: Command) -> Reply;
}

type Request = (Command, oneshot::Sender<Reply>);

/// Sending half of a command channel.
#[derive(Clone)]
pub struct CommandClient {
    tx: mpsc::Sender<Request>,
    target: Arc<str>,
    retry: RetryConfig,
}

/// Serve `handler` on a new channel. Each command is handled in its own
/// task. The server stops once every client is dropped.
pub fn channel(target: &str, handler: Arc<dyn CommandHandler>) -> (CommandClient, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Request>(32);
    let name = target.to_string();
    let server = tokio::spawn(async move {
        while let Some((command, reply)) = rx.recv().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let response = handler.handle(command).await;
                // The sender may have stopped waiting.
                let _ = reply.send(response);
            });
        }
        debug!(target_name = %name, "command server stopped");
    });
    (
        CommandClient {
            tx,
            target: Arc::from(target),
            retry: RetryConfig::default(),
        },
        server,
    )
}

impl CommandClient {
    /// A client with nothing listening; every send fails with `Disconnected`.
    pub fn detached(target: &str) -> Self {
        let (tx, _) = mpsc::channel(1);
        Self {
            tx,
            target: Arc::from(target),
            retry: RetryConfig::default(),
        }
    }

    /// Retry policy for [`send_with_retry`](Self::send_with_retry).
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Send once and wait for the reply.
    pub async fn send(&self, command: Command) -> Result<Reply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((command, reply_tx))
            .await
            .map_err(|_| MindfulError::Disconnected)?;
        reply_rx.await.map_err(|_| MindfulError::Disconnected)
    }

    /// Send, retrying while the receiving side is not yet listening.
    #[instrument(name = "command.send", skip(self, command), fields(channel = %self.target, action = command.action()))]
    pub async fn send_with_retry(&self, command: Command) -> Result<Reply> {
        with_retry(&self.retry, &self.target, command.action(), || {
            self.send(command.clone())
        })
        .await
    }
}
