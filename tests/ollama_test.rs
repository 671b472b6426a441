//! Ollama provider against a wiremock server.
#![cfg(feature = "ollama")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mindful::MindfulError;
use mindful::background::BackgroundService;
use mindful::providers::{CapabilityRegistry, OllamaProvider, RetryConfig};
use mindful::types::{
    Availability, CapabilityKind, DownloadMonitor, DownloadProgress, SummaryPipeline,
};

fn provider(server: &MockServer) -> OllamaProvider {
    OllamaProvider::with_base_url(server.uri(), "llama3.2")
        .unwrap()
        .retry_config(
            RetryConfig::new()
                .max_attempts(2)
                .initial_delay(Duration::from_millis(1)),
        )
}

async fn mount_tags(server: &MockServer, models: &[&str]) {
    let models: Vec<_> = models.iter().map(|m| json!({ "name": m })).collect();
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": models })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn tagged_model_is_available() {
    let server = MockServer::start().await;
    mount_tags(&server, &["llama3.2:latest", "qwen2.5:7b"]).await;

    let registry = CapabilityRegistry::builder()
        .provider(Arc::new(provider(&server)))
        .build();
    assert_eq!(
        registry.probe(CapabilityKind::LanguageModel).await,
        Availability::Available
    );
}

#[tokio::test]
async fn missing_model_is_downloadable_and_rejected_when_required() {
    let server = MockServer::start().await;
    mount_tags(&server, &["qwen2.5:7b"]).await;

    let registry = CapabilityRegistry::builder()
        .provider(Arc::new(provider(&server)))
        .build();
    assert_eq!(
        registry.probe(CapabilityKind::Summarizer).await,
        Availability::Downloadable
    );
    assert!(matches!(
        registry.summarizer(None).await,
        Err(MindfulError::CapabilityUnavailable(_))
    ));
}

#[tokio::test]
async fn download_progress_reaches_the_monitor() {
    let server = MockServer::start().await;
    mount_tags(&server, &[]).await;
    let progress = concat!(
        "{\"status\":\"pulling manifest\"}\n",
        "{\"status\":\"downloading\",\"total\":100,\"completed\":40}\n",
        "{\"status\":\"downloading\",\"total\":100,\"completed\":100}\n",
        "{\"status\":\"success\"}\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .and(body_partial_json(json!({ "model": "llama3.2", "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_string(progress))
        .expect(1)
        .mount(&server)
        .await;

    let registry = CapabilityRegistry::builder()
        .provider(Arc::new(provider(&server)))
        .allow_download(true)
        .build();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let monitor: DownloadMonitor = {
        let seen = seen.clone();
        Arc::new(move |p: DownloadProgress| seen.lock().unwrap().push(p.percent()))
    };
    registry.language_model(Some(monitor)).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![Some(40), Some(100)]);
}

#[tokio::test]
async fn failed_pull_resets_the_handle() {
    let server = MockServer::start().await;
    mount_tags(&server, &[]).await;
    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"error\":\"disk full\"}\n"))
        .mount(&server)
        .await;

    let registry = CapabilityRegistry::builder()
        .provider(Arc::new(provider(&server)))
        .allow_download(true)
        .build();
    let err = registry.rewriter(None).await.err().unwrap();
    assert!(matches!(err, MindfulError::InitializationFailed(m) if m.contains("disk full")));
    assert!(!registry.is_ready(CapabilityKind::Rewriter));
}

#[tokio::test]
async fn background_summary_over_ollama() {
    let server = MockServer::start().await;
    mount_tags(&server, &["llama3.2"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({ "model": "llama3.2", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2",
            "response": "Plants turn sunlight into food. This takes 2 stages.",
            "done": true
        })))
        .mount(&server)
        .await;

    let registry = CapabilityRegistry::builder()
        .provider(Arc::new(provider(&server)))
        .build();
    let service = BackgroundService::new(Arc::new(registry));

    let summary = service
        .summarize_page("Photosynthesis is how plants make food from light.")
        .await
        .unwrap();
    assert_eq!(summary.pipeline, SummaryPipeline::SummarizerRewriter);
    assert!(summary.text.contains("<strong>"));
}

#[tokio::test]
async fn unknown_model_on_generate_is_unavailable() {
    let server = MockServer::start().await;
    mount_tags(&server, &["llama3.2"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let registry = CapabilityRegistry::builder()
        .provider(Arc::new(provider(&server)))
        .build();
    let session = registry.language_model(None).await.unwrap();
    assert!(matches!(
        session.prompt("hello").await,
        Err(MindfulError::CapabilityUnavailable(_))
    ));
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    mount_tags(&server, &["llama3.2"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(503).set_body_string("loading model"))
        .expect(2)
        .mount(&server)
        .await;

    let registry = CapabilityRegistry::builder()
        .provider(Arc::new(provider(&server)))
        .build();
    let session = registry.language_model(None).await.unwrap();
    assert!(matches!(
        session.prompt("hello").await,
        Err(MindfulError::Http(_))
    ));
}
