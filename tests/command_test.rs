//! Command channel and the background service behind it.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeProvider, PHOTOSYNTHESIS_PAGE};
use mindful::MindfulError;
use mindful::background::BackgroundService;
use mindful::command::{self, Command, CommandClient};
use mindful::providers::{CapabilityRegistry, RetryConfig};
use mindful::types::{SummaryPipeline, UsefulnessAssessment};

fn background(provider: FakeProvider) -> CommandClient {
    let registry = CapabilityRegistry::builder()
        .provider(Arc::new(provider))
        .build();
    let (client, _server) = command::channel(
        "background",
        Arc::new(BackgroundService::new(Arc::new(registry))),
    );
    client
}

#[tokio::test]
async fn assess_usefulness_round_trip() {
    let client = background(FakeProvider::new().prompt(|prompt| {
        assert!(prompt.contains("User goal: \"learn about photosynthesis\""));
        assert!(prompt.contains("Page title: Photosynthesis"));
        Ok(serde_json::json!({
            "output": "Score: 9/10\nExplanation: On topic.\nRelevant Information:\n- Calvin cycle"
        }))
    }));

    let reply = client
        .send(Command::AssessUsefulness {
            intent: "learn about photosynthesis".into(),
            page_text: PHOTOSYNTHESIS_PAGE.into(),
            page_title: "Photosynthesis".into(),
            page_url: "https://plants.test/".into(),
        })
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let assessment = UsefulnessAssessment::parse(&reply.assessment.unwrap()).unwrap();
    assert_eq!(assessment.score, Some(9));
    assert_eq!(assessment.relevant, vec!["Calvin cycle"]);
}

#[tokio::test]
async fn summary_falls_back_to_the_language_model() {
    let client = background(
        FakeProvider::new().prompt_text("**Plants** make their own food from light."),
    );

    let summary = client
        .send(Command::SummarizePage {
            page_text: PHOTOSYNTHESIS_PAGE.into(),
        })
        .await
        .unwrap()
        .into_result()
        .unwrap()
        .into_summary()
        .unwrap();

    assert_eq!(summary.pipeline, SummaryPipeline::Prompt);
    assert_eq!(
        summary.text,
        "<strong>Plants</strong> make their own food from light."
    );
}

#[tokio::test]
async fn mood_is_matched_against_the_offered_list() {
    let client = background(FakeProvider::new().prompt_text("I'd say: tired."));

    let reply = client
        .send(Command::ClassifyJournalMood {
            text: "Long day, barely slept.".into(),
            moods: vec!["Happy".into(), "Tired".into()],
        })
        .await
        .unwrap();
    assert_eq!(reply.mood.as_deref(), Some("Tired"));
}

#[tokio::test]
async fn handler_failure_becomes_a_remote_error() {
    let client = background(FakeProvider::new());

    let reply = client
        .send(Command::AssessUsefulness {
            intent: "learn".into(),
            page_text: PHOTOSYNTHESIS_PAGE.into(),
            page_title: String::new(),
            page_url: String::new(),
        })
        .await
        .unwrap();
    assert!(!reply.success);
    assert!(matches!(
        reply.into_result(),
        Err(MindfulError::RemoteError(m)) if m.contains("no prompt scripted")
    ));
}

#[tokio::test]
async fn unsupported_action_is_refused() {
    let client = background(FakeProvider::new());
    let reply = client
        .send(Command::UpdateIntent {
            intent: "x".into(),
            mode: mindful::types::Mode::Focus,
        })
        .await
        .unwrap();
    assert_eq!(
        reply.error.as_deref(),
        Some("unsupported action 'updateIntent' for background service")
    );
}

#[tokio::test(start_paused = true)]
async fn detached_client_retries_then_gives_up() {
    let client = CommandClient::detached("content").retry_config(
        RetryConfig::new()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(500)),
    );

    let started = tokio::time::Instant::now();
    let result = client.send_with_retry(Command::Ping).await;

    assert_eq!(result, Err(MindfulError::Disconnected));
    assert_eq!(started.elapsed(), Duration::from_millis(1000));
}

#[tokio::test]
async fn live_client_answers_on_the_first_attempt() {
    let client = background(FakeProvider::new()).retry_config(RetryConfig::disabled());
    let reply = client.send_with_retry(Command::Ping).await.unwrap();
    assert_eq!(reply.ready, Some(true));
    assert_eq!(client.target(), "background");
}
