//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use mindful::agent::{Presenter, View};
use mindful::providers::{
    CapabilityFactory, LanguageModelSession, RewriterSession, SummarizerSession,
};
use mindful::types::{Availability, DownloadMonitor, DownloadProgress};
use mindful::{MindfulError, Result};

pub const PHOTOSYNTHESIS_PAGE: &str = "Photosynthesis is the process by which green plants, \
    algae and some bacteria convert light energy into chemical energy. Chlorophyll in the \
    chloroplasts absorbs light, which drives the splitting of water and the release of oxygen. \
    The Calvin cycle then fixes carbon dioxide into glucose. Light intensity, carbon dioxide \
    concentration and temperature all limit the rate of photosynthesis.";

type PromptFn = dyn Fn(&str) -> Result<Value> + Send + Sync;

/// Scriptable provider usable for all three capability kinds.
pub struct FakeProvider {
    availability: Mutex<Availability>,
    create_delay: Duration,
    failing_creates: AtomicUsize,
    creates: AtomicUsize,
    summary: Option<String>,
    rewrite: Option<String>,
    prompt: Arc<PromptFn>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            availability: Mutex::new(Availability::Available),
            create_delay: Duration::ZERO,
            failing_creates: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            summary: None,
            rewrite: None,
            prompt: Arc::new(|_| Err(MindfulError::RemoteError("no prompt scripted".into()))),
        }
    }

    pub fn availability(self, availability: Availability) -> Self {
        *self.availability.lock().unwrap() = availability;
        self
    }

    pub fn set_availability(&self, availability: Availability) {
        *self.availability.lock().unwrap() = availability;
    }

    pub fn create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// Fail the first `n` session creations.
    pub fn failing_creates(self, n: usize) -> Self {
        self.failing_creates.store(n, Ordering::SeqCst);
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn rewrite(mut self, rewrite: &str) -> Self {
        self.rewrite = Some(rewrite.to_string());
        self
    }

    pub fn prompt(mut self, f: impl Fn(&str) -> Result<Value> + Send + Sync + 'static) -> Self {
        self.prompt = Arc::new(f);
        self
    }

    pub fn prompt_text(self, text: &str) -> Self {
        let text = text.to_string();
        self.prompt(move |_| Ok(Value::String(text.clone())))
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    async fn create_session(&self, monitor: Option<DownloadMonitor>) -> Result<Arc<FakeSession>> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if let Some(monitor) = monitor {
            monitor(DownloadProgress { loaded: Some(0.5) });
        }
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        let failing = self.failing_creates.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_creates.store(failing - 1, Ordering::SeqCst);
            return Err(MindfulError::RemoteError("model crashed".into()));
        }
        Ok(Arc::new(FakeSession {
            summary: self.summary.clone(),
            rewrite: self.rewrite.clone(),
            prompt: self.prompt.clone(),
        }))
    }
}

struct FakeSession {
    summary: Option<String>,
    rewrite: Option<String>,
    prompt: Arc<PromptFn>,
}

#[async_trait]
impl SummarizerSession for FakeSession {
    async fn summarize(&self, _input: &str, _context: &str) -> Result<Value> {
        self.summary
            .clone()
            .map(Value::String)
            .ok_or_else(|| MindfulError::RemoteError("summarizer failed".into()))
    }
}

#[async_trait]
impl RewriterSession for FakeSession {
    async fn rewrite(&self, _input: &str, _instructions: &str) -> Result<Value> {
        self.rewrite
            .clone()
            .map(|r| json!({ "rewritten": r }))
            .ok_or_else(|| MindfulError::RemoteError("rewriter failed".into()))
    }
}

#[async_trait]
impl LanguageModelSession for FakeSession {
    async fn prompt(&self, input: &str) -> Result<Value> {
        (self.prompt)(input)
    }
}

macro_rules! fake_factory {
    ($session:ty) => {
        #[async_trait]
        impl CapabilityFactory<$session> for FakeProvider {
            fn name(&self) -> &str {
                "fake"
            }

            async fn availability(&self) -> Result<Availability> {
                Ok(*self.availability.lock().unwrap())
            }

            async fn create(&self, monitor: Option<DownloadMonitor>) -> Result<Arc<$session>> {
                let session: Arc<$session> = self.create_session(monitor).await?;
                Ok(session)
            }
        }
    };
}

fake_factory!(dyn SummarizerSession);
fake_factory!(dyn RewriterSession);
fake_factory!(dyn LanguageModelSession);

/// Records every view it is asked to present.
#[derive(Default)]
pub struct RecordingPresenter {
    views: Mutex<Vec<View>>,
}

impl RecordingPresenter {
    pub fn views(&self) -> Vec<View> {
        self.views.lock().unwrap().clone()
    }

    pub fn nudges(&self) -> usize {
        self.views()
            .iter()
            .filter(|v| matches!(v, View::Nudge { .. }))
            .count()
    }
}

impl Presenter for RecordingPresenter {
    fn present(&self, view: View) {
        self.views.lock().unwrap().push(view);
    }
}
