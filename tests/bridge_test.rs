//! Page bridge: correlation, status relay, timeouts and the page responder.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;

use common::{FakeProvider, PHOTOSYNTHESIS_PAGE};
use mindful::MindfulError;
use mindful::bridge::envelope::{
    Body, CONTENT_SOURCE, Envelope, Message, PAGE_SOURCE, RequestBody, ResultBody,
};
use mindful::bridge::{
    BridgeChannel, BridgeConfig, PageBridge, PageResponder, RequestMetadata, StatusCallback,
    window,
};
use mindful::providers::CapabilityRegistry;
use mindful::types::SummaryPipeline;

fn metadata(intent: &str) -> RequestMetadata {
    RequestMetadata {
        intent: intent.to_string(),
        title: "Photosynthesis".to_string(),
        url: "https://plants.test/photosynthesis".to_string(),
    }
}

fn page_registry(provider: FakeProvider) -> Arc<CapabilityRegistry> {
    Arc::new(
        CapabilityRegistry::builder()
            .provider(Arc::new(provider))
            .allow_download(true)
            .build(),
    )
}

fn recorder() -> (StatusCallback, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let callback: StatusCallback = {
        let seen = seen.clone();
        Arc::new(move |message: &str| seen.lock().unwrap().push(message.to_string()))
    };
    (callback, seen)
}

/// A hand-driven page side: read requests, post arbitrary replies.
struct ManualPage {
    outbound: mpsc::UnboundedSender<Value>,
    inbound: mpsc::UnboundedReceiver<Value>,
}

impl ManualPage {
    async fn next_request(&mut self) -> (String, BridgeChannel, RequestBody) {
        let raw = self.inbound.recv().await.unwrap();
        let envelope = Envelope::decode(raw).unwrap();
        assert_eq!(envelope.source, CONTENT_SOURCE);
        let channel = envelope.message.channel();
        match envelope.message.into_body() {
            Body::Request(body) => (envelope.request_id, channel, body),
            other => panic!("expected a request, got {other:?}"),
        }
    }

    fn post(&self, source: &str, request_id: &str, message: Message) {
        let envelope = Envelope::new(source, request_id, message);
        self.outbound.send(envelope.encode().unwrap()).unwrap();
    }
}

fn manual_bridge(timeout: Duration) -> (PageBridge, ManualPage) {
    let (content, page) = window();
    let (outbound, inbound) = page.into_parts();
    let bridge = PageBridge::connect(content, BridgeConfig::new().timeout(timeout));
    (bridge, ManualPage { outbound, inbound })
}

#[tokio::test]
async fn summary_round_trip_through_the_responder() {
    let provider = FakeProvider::new()
        .summary("Plants turn light into sugar.")
        .rewrite("Plants gently turn light into <strong>sugar</strong>.");
    let (content, page) = window();
    let _responder = PageResponder::spawn(page_registry(provider), page);
    let bridge = PageBridge::connect(content, BridgeConfig::default());

    let (on_status, seen) = recorder();
    let summary = bridge
        .summarize(PHOTOSYNTHESIS_PAGE, metadata(""), Some(on_status))
        .await
        .unwrap();

    assert_eq!(summary.pipeline, SummaryPipeline::SummarizerRewriter);
    assert!(summary.text.contains("<strong>sugar</strong>"));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "Checking built-in AI availability…",
            "Downloading on-device model… 50%",
            "Generating quick overview…",
            "Softening tone for calm delivery…",
        ]
    );
    assert_eq!(bridge.pending_count(), 0);
}

#[tokio::test]
async fn summary_without_rewriter_reports_base_pipeline() {
    let provider = FakeProvider::new().summary("Plants turn light into sugar.");
    let (content, page) = window();
    let _responder = PageResponder::spawn(page_registry(provider), page);
    let bridge = PageBridge::connect(content, BridgeConfig::default());

    let (on_status, seen) = recorder();
    let summary = bridge
        .summarize(PHOTOSYNTHESIS_PAGE, metadata("biology"), Some(on_status))
        .await
        .unwrap();

    assert_eq!(summary.pipeline, SummaryPipeline::Summarizer);
    assert_eq!(summary.text, "Plants turn light into sugar.");
    let last = seen.lock().unwrap().last().cloned().unwrap();
    assert!(last.starts_with("Rewriter unavailable"), "{last}");
}

#[tokio::test]
async fn usefulness_round_trip_through_the_responder() {
    let provider = FakeProvider::new().prompt_text(
        "```json\n{\"score\": 8.6, \"explanation\": \"Explains the process.\", \
         \"relevant\": [\"Chlorophyll absorbs light\"]}\n```",
    );
    let (content, page) = window();
    let _responder = PageResponder::spawn(page_registry(provider), page);
    let bridge = PageBridge::connect(content, BridgeConfig::default());

    let payload = bridge
        .assess(PHOTOSYNTHESIS_PAGE, metadata("learn about photosynthesis"), None)
        .await
        .unwrap();

    assert_eq!(payload.numeric_score, Some(9.0));
    assert_eq!(payload.mode, "prompt");
    assert!(payload.assessment_text.starts_with("Score: 9/10"));
    assert!(payload.assessment_text.contains("- Chlorophyll absorbs light"));
}

#[tokio::test]
async fn unparseable_prompt_output_is_a_remote_error() {
    let provider = FakeProvider::new().prompt_text("I think it's quite useful!");
    let (content, page) = window();
    let _responder = PageResponder::spawn(page_registry(provider), page);
    let bridge = PageBridge::connect(content, BridgeConfig::default());

    let err = bridge
        .assess(PHOTOSYNTHESIS_PAGE, metadata("learn"), None)
        .await
        .unwrap_err();
    match err {
        MindfulError::RemoteError(message) => {
            assert!(message.contains("Unable to parse Prompt API response as JSON."))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_capability_fails_with_the_page_error() {
    let (content, page) = window();
    let _responder = PageResponder::spawn(Arc::new(CapabilityRegistry::empty()), page);
    let bridge = PageBridge::connect(content, BridgeConfig::default());

    let err = bridge
        .summarize(PHOTOSYNTHESIS_PAGE, metadata(""), None)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, MindfulError::RemoteError(m) if m.contains("capability unavailable")),
        "{err:?}"
    );
    assert_eq!(bridge.pending_count(), 0);
}

#[tokio::test]
async fn empty_text_is_rejected_by_the_page() {
    let (content, page) = window();
    let _responder = PageResponder::spawn(page_registry(FakeProvider::new()), page);
    let bridge = PageBridge::connect(content, BridgeConfig::default());

    let err = bridge.summarize("   ", metadata(""), None).await.unwrap_err();
    assert!(matches!(err, MindfulError::RemoteError(m) if m.contains("No text provided")));
}

#[tokio::test(start_paused = true)]
async fn no_responder_means_timeout() {
    let (content, _page) = window();
    let bridge = PageBridge::connect(content, BridgeConfig::new().timeout(Duration::from_secs(25)));

    let err = bridge
        .assess("text", metadata("learn"), None)
        .await
        .unwrap_err();
    assert_eq!(err, MindfulError::Timeout(Duration::from_secs(25)));
    assert_eq!(bridge.pending_count(), 0);
}

#[tokio::test]
async fn concurrent_requests_are_correlated_by_id() {
    let (bridge, mut page) = manual_bridge(Duration::from_secs(5));
    let bridge = Arc::new(bridge);

    let first = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            bridge
                .send(BridgeChannel::Summary, "first", RequestMetadata::default(), None)
                .await
        })
    };
    let (first_id, _, first_body) = page.next_request().await;
    assert_eq!(first_body.text, "first");

    let second = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            bridge
                .send(BridgeChannel::Summary, "second", RequestMetadata::default(), None)
                .await
        })
    };
    let (second_id, _, _) = page.next_request().await;
    assert_ne!(first_id, second_id);
    assert_eq!(bridge.pending_count(), 2);

    // Answer out of order.
    page.post(
        PAGE_SOURCE,
        &second_id,
        Message::result(BridgeChannel::Summary, ResultBody::ok(json!("two"))),
    );
    page.post(
        PAGE_SOURCE,
        &first_id,
        Message::result(BridgeChannel::Summary, ResultBody::ok(json!("one"))),
    );

    assert_eq!(second.await.unwrap().unwrap(), json!("two"));
    assert_eq!(first.await.unwrap().unwrap(), json!("one"));
    assert_eq!(bridge.pending_count(), 0);
}

#[tokio::test]
async fn foreign_and_mismatched_messages_are_ignored() {
    let (bridge, mut page) = manual_bridge(Duration::from_secs(5));
    let bridge = Arc::new(bridge);
    let (on_status, seen) = recorder();

    let request = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            bridge
                .send(
                    BridgeChannel::Usefulness,
                    "text",
                    RequestMetadata::default(),
                    Some(on_status),
                )
                .await
        })
    };
    let (id, channel, _) = page.next_request().await;
    assert_eq!(channel, BridgeChannel::Usefulness);

    page.post(
        "some-other-extension",
        &id,
        Message::result(BridgeChannel::Usefulness, ResultBody::ok(json!("forged"))),
    );
    page.post(
        PAGE_SOURCE,
        &id,
        Message::status(BridgeChannel::Summary, "wrong channel"),
    );
    page.post(
        PAGE_SOURCE,
        &id,
        Message::result(BridgeChannel::Summary, ResultBody::ok(json!("wrong channel"))),
    );
    page.post(
        PAGE_SOURCE,
        "unknown-id",
        Message::result(BridgeChannel::Usefulness, ResultBody::ok(json!("stray"))),
    );
    page.outbound.send(json!({"type": "garbage"})).unwrap();
    page.post(
        PAGE_SOURCE,
        &id,
        Message::status(BridgeChannel::Usefulness, "Reviewing page content…"),
    );
    page.post(
        PAGE_SOURCE,
        &id,
        Message::result(BridgeChannel::Usefulness, ResultBody::ok(json!("genuine"))),
    );

    assert_eq!(request.await.unwrap().unwrap(), json!("genuine"));
    assert_eq!(*seen.lock().unwrap(), vec!["Reviewing page content…"]);
}

#[tokio::test]
async fn failure_without_message_gets_a_default_error() {
    let (bridge, mut page) = manual_bridge(Duration::from_secs(5));
    let bridge = Arc::new(bridge);

    let request = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            bridge
                .send(BridgeChannel::Summary, "text", RequestMetadata::default(), None)
                .await
        })
    };
    let (id, _, _) = page.next_request().await;
    page.post(
        PAGE_SOURCE,
        &id,
        Message::result(
            BridgeChannel::Summary,
            ResultBody {
                success: false,
                payload: None,
                error: None,
            },
        ),
    );

    assert_eq!(
        request.await.unwrap(),
        Err(MindfulError::RemoteError(
            "Unknown error from page bridge.".to_string()
        ))
    );
}

#[tokio::test]
async fn abandoned_request_is_removed_from_pending() {
    let (bridge, mut page) = manual_bridge(Duration::from_secs(60));
    let bridge = Arc::new(bridge);

    let request = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            bridge
                .send(BridgeChannel::Summary, "text", RequestMetadata::default(), None)
                .await
        })
    };
    let (id, _, _) = page.next_request().await;
    assert_eq!(bridge.pending_count(), 1);

    request.abort();
    let _ = request.await;
    assert_eq!(bridge.pending_count(), 0);

    // A late result for the abandoned id goes nowhere.
    page.post(
        PAGE_SOURCE,
        &id,
        Message::result(BridgeChannel::Summary, ResultBody::ok(json!("late"))),
    );
    tokio::task::yield_now().await;
    assert_eq!(bridge.pending_count(), 0);
}
