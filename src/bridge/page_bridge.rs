use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::envelope::{
    Body, BridgeChannel, CONTENT_SOURCE, Envelope, Message, PAGE_SOURCE, RequestBody,
    RequestMetadata, SummaryPayload, UsefulnessPayload,
};
use super::{BridgeConfig, Port};
use crate::storage::{Clock, SystemClock};
use crate::types::CalmSummary;
use crate::{MindfulError, Result, telemetry};

/// Receives progress messages for one request, in emission order.
pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;

struct Pending {
    channel: BridgeChannel,
    reply: oneshot::Sender<Result<Value>>,
    on_status: Option<StatusCallback>,
}

type PendingMap = Arc<Mutex<HashMap<String, Pending>>>;

/// Content-side end of the bridge.
///
/// Each [`send`](Self::send) registers a pending entry under a fresh request
/// id, posts the request, and waits for the matching final result. A
/// background listener routes incoming messages to their pending entry.
/// The entry is removed on result, on timeout, and when the caller stops
/// waiting. An absent page side shows up as a timeout.
pub struct PageBridge {
    outbound: mpsc::UnboundedSender<Value>,
    pending: PendingMap,
    config: BridgeConfig,
    clock: Arc<dyn Clock>,
    listener: JoinHandle<()>,
}

impl PageBridge {
    /// Attach to the content side of a window. Must be called within a
    /// tokio runtime.
    pub fn connect(port: Port, config: BridgeConfig) -> Self {
        Self::connect_with_clock(port, config, Arc::new(SystemClock))
    }

    pub fn connect_with_clock(port: Port, config: BridgeConfig, clock: Arc<dyn Clock>) -> Self {
        let (outbound, inbound) = port.into_parts();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let routes = pending.clone();
        let listener = tokio::spawn(async move {
            let mut messages = UnboundedReceiverStream::new(inbound);
            while let Some(message) = messages.next().await {
                route_message(&routes, message);
            }
            debug!("bridge window closed");
        });

        Self {
            outbound,
            pending,
            config,
            clock,
            listener,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Number of requests still awaiting a result.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Send a request and wait for its payload.
    #[instrument(name = "bridge.send", skip(self, text, metadata, on_status), fields(channel = %channel))]
    pub async fn send(
        &self,
        channel: BridgeChannel,
        text: &str,
        metadata: RequestMetadata,
        on_status: Option<StatusCallback>,
    ) -> Result<Value> {
        let request_id = self.next_request_id(channel);
        let (reply, response) = oneshot::channel();
        lock(&self.pending).insert(
            request_id.clone(),
            Pending {
                channel,
                reply,
                on_status,
            },
        );
        let _guard = PendingGuard {
            pending: self.pending.clone(),
            request_id: request_id.clone(),
        };

        let envelope = Envelope::new(
            CONTENT_SOURCE,
            request_id.clone(),
            Message::request(
                channel,
                RequestBody {
                    text: text.to_string(),
                    metadata,
                },
            ),
        );
        if self.outbound.send(envelope.encode()?).is_err() {
            debug!(%request_id, "no page listener, waiting out the timeout");
        }

        let started = Instant::now();
        let result = match tokio::time::timeout(self.config.timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(MindfulError::Disconnected),
            Err(_) => Err(MindfulError::Timeout(self.config.timeout)),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(MindfulError::Timeout(_)) => "timeout",
            Err(_) => "remote_error",
        };
        metrics::counter!(telemetry::BRIDGE_REQUESTS_TOTAL,
            "channel" => channel.as_str(),
            "outcome" => outcome,
        )
        .increment(1);
        metrics::histogram!(telemetry::BRIDGE_DURATION_SECONDS, "channel" => channel.as_str())
            .record(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            warn!(%request_id, error = %e, "bridge request failed");
        }
        result
    }

    /// Request a calm summary from the page.
    pub async fn summarize(
        &self,
        text: &str,
        metadata: RequestMetadata,
        on_status: Option<StatusCallback>,
    ) -> Result<CalmSummary> {
        let payload = self
            .send(BridgeChannel::Summary, text, metadata, on_status)
            .await?;
        Ok(SummaryPayload::from_value(payload)?.into_summary())
    }

    /// Request a usefulness assessment from the page.
    pub async fn assess(
        &self,
        text: &str,
        metadata: RequestMetadata,
        on_status: Option<StatusCallback>,
    ) -> Result<UsefulnessPayload> {
        let payload = self
            .send(BridgeChannel::Usefulness, text, metadata, on_status)
            .await?;
        UsefulnessPayload::from_value(payload)
    }

    fn next_request_id(&self, channel: BridgeChannel) -> String {
        format!(
            "mindful-{}-{}-{}",
            channel.as_str(),
            self.clock.now_millis(),
            Uuid::new_v4().simple()
        )
    }
}

impl Drop for PageBridge {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Removes a pending entry however the waiting caller exits.
struct PendingGuard {
    pending: PendingMap,
    request_id: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.request_id);
    }
}

fn route_message(pending: &PendingMap, raw: Value) {
    let Some(envelope) = Envelope::decode(raw) else {
        debug!("dropping malformed bridge message");
        return;
    };
    if envelope.source != PAGE_SOURCE {
        return;
    }
    let channel = envelope.message.channel();
    let request_id = envelope.request_id;

    match envelope.message.into_body() {
        Body::Request(_) => {}
        Body::Status(status) => {
            let callback = {
                let map = lock(pending);
                match map.get(&request_id) {
                    Some(entry) if entry.channel == channel => entry.on_status.clone(),
                    _ => return,
                }
            };
            if let Some(callback) = callback {
                callback(&status.message);
            }
        }
        Body::Result(result) => {
            let entry = {
                let mut map = lock(pending);
                match map.get(&request_id) {
                    Some(entry) if entry.channel == channel => map.remove(&request_id),
                    _ => None,
                }
            };
            let Some(entry) = entry else {
                debug!(%request_id, "result for unknown or completed request");
                return;
            };
            let outcome = if result.success {
                Ok(result.payload.unwrap_or(Value::Null))
            } else {
                Err(MindfulError::RemoteError(
                    result
                        .error
                        .unwrap_or_else(|| "Unknown error from page bridge.".to_string()),
                ))
            };
            // The caller may have given up already.
            let _ = entry.reply.send(outcome);
        }
    }
}

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<String, Pending>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
