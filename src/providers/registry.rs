//! Capability registry with coalesced, self-healing initialization.
//!
//! Each context owns one [`CapabilityRegistry`]. It holds one
//! [`CapabilityHandle`] per [`CapabilityKind`]; a handle memoizes its session
//! for the life of the process.
//!
//! # Initialization
//!
//! ```text
//! acquire() ──► session cached? ──yes──► return it
//!                    │ no
//!                    ▼
//!            init in flight? ──yes──► await the same init
//!                    │ no
//!                    ▼
//!       factory present? ── availability ── create(monitor)
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!     ok: cache session   err: reset handle
//! ```
//!
//! Concurrent callers all observe the same outcome. A failure leaves nothing
//! behind, so the next call starts a fresh attempt.
//!
//! # Availability policy
//!
//! The background context requires `available`. The page context may allow
//! `downloadable` / `downloading` and forwards download progress to the
//! caller's monitor.

use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::{debug, instrument, warn};

use super::traits::{
    CapabilityFactory, LanguageModelFactory, LanguageModelSession, RewriterFactory,
    RewriterSession, SummarizerFactory, SummarizerSession,
};
use crate::telemetry;
use crate::types::{Availability, CapabilityKind, DownloadMonitor};
use crate::{MindfulError, Result};

type InitFuture<S> = Shared<BoxFuture<'static, Result<Arc<S>>>>;

struct HandleState<S: ?Sized> {
    session: Option<Arc<S>>,
    availability: Option<Availability>,
    in_flight: Option<InitFuture<S>>,
    /// Bumped on invalidation so a stale init cannot repopulate the handle.
    generation: u64,
}

impl<S: ?Sized> Default for HandleState<S> {
    fn default() -> Self {
        Self {
            session: None,
            availability: None,
            in_flight: None,
            generation: 0,
        }
    }
}

/// Memoized session for one capability kind.
pub struct CapabilityHandle<S: ?Sized + Send + Sync + 'static> {
    kind: CapabilityKind,
    factory: Option<Arc<dyn CapabilityFactory<S>>>,
    allow_download: bool,
    state: Arc<Mutex<HandleState<S>>>,
}

impl<S: ?Sized + Send + Sync + 'static> CapabilityHandle<S> {
    fn new(
        kind: CapabilityKind,
        factory: Option<Arc<dyn CapabilityFactory<S>>>,
        allow_download: bool,
    ) -> Self {
        Self {
            kind,
            factory,
            allow_download,
            state: Arc::new(Mutex::new(HandleState::default())),
        }
    }

    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    /// Last availability observed by a probe or a successful init.
    pub fn last_availability(&self) -> Option<Availability> {
        lock(&self.state).availability
    }

    /// Whether a session is currently cached.
    pub fn is_ready(&self) -> bool {
        lock(&self.state).session.is_some()
    }

    /// Return the cached session, joining or starting initialization.
    ///
    /// The monitor only takes effect for the caller that starts the init.
    pub async fn acquire(&self, monitor: Option<DownloadMonitor>) -> Result<Arc<S>> {
        let init = {
            let mut state = lock(&self.state);
            if let Some(session) = &state.session {
                return Ok(session.clone());
            }
            match &state.in_flight {
                Some(init) => {
                    debug!(capability = %self.kind, "joining in-flight initialization");
                    init.clone()
                }
                None => {
                    let init = self.start_init(state.generation, monitor);
                    state.in_flight = Some(init.clone());
                    init
                }
            }
        };
        init.await
    }

    fn start_init(&self, generation: u64, monitor: Option<DownloadMonitor>) -> InitFuture<S> {
        let kind = self.kind;
        let factory = self.factory.clone();
        let allow_download = self.allow_download;
        let state = self.state.clone();

        async move {
            let result = initialize(kind, factory, allow_download, monitor).await;

            let status = if result.is_ok() { "ok" } else { "error" };
            metrics::counter!(telemetry::CAPABILITY_INITS_TOTAL,
                "capability" => kind.as_str(),
                "status" => status,
            )
            .increment(1);

            let mut state = lock(&state);
            if state.generation == generation {
                state.in_flight = None;
                match &result {
                    Ok((session, availability)) => {
                        state.session = Some(session.clone());
                        state.availability = Some(*availability);
                    }
                    Err(e) => {
                        warn!(capability = %kind, error = %e, "capability initialization failed");
                        state.session = None;
                        state.availability = None;
                    }
                }
            }
            result.map(|(session, _)| session)
        }
        .boxed()
        .shared()
    }

    /// Query availability without creating a session.
    pub async fn probe(&self) -> Availability {
        let Some(factory) = &self.factory else {
            return Availability::Unavailable;
        };
        let availability = match factory.availability().await {
            Ok(a) => a,
            Err(e) => {
                warn!(capability = %self.kind, error = %e, "availability probe failed");
                Availability::Unavailable
            }
        };
        lock(&self.state).availability = Some(availability);
        availability
    }

    /// Drop the cached session and any in-flight initialization.
    pub fn invalidate(&self) {
        let mut state = lock(&self.state);
        state.session = None;
        state.availability = None;
        state.in_flight = None;
        state.generation += 1;
    }
}

async fn initialize<S: ?Sized + Send + Sync>(
    kind: CapabilityKind,
    factory: Option<Arc<dyn CapabilityFactory<S>>>,
    allow_download: bool,
    monitor: Option<DownloadMonitor>,
) -> Result<(Arc<S>, Availability)> {
    let factory = factory
        .ok_or_else(|| MindfulError::CapabilityUnavailable(format!("{kind} not present")))?;

    let availability = factory.availability().await.map_err(|e| {
        MindfulError::InitializationFailed(format!("{kind} availability check failed: {e}"))
    })?;

    match availability {
        Availability::Available => {}
        Availability::Downloadable | Availability::Downloading if allow_download => {
            debug!(capability = %kind, %availability, "model download required");
        }
        other => {
            return Err(MindfulError::CapabilityUnavailable(format!(
                "{kind} is {other}"
            )));
        }
    }

    let session = factory.create(monitor).await.map_err(|e| match e {
        MindfulError::CapabilityUnavailable(_) => e,
        other => MindfulError::InitializationFailed(format!(
            "{} failed to create {kind} session: {other}",
            factory.name()
        )),
    })?;
    debug!(capability = %kind, factory = factory.name(), "capability session created");
    Ok((session, availability))
}

// A poisoned lock only means a panic elsewhere; the state itself stays valid.
fn lock<S: ?Sized>(state: &Arc<Mutex<HandleState<S>>>) -> MutexGuard<'_, HandleState<S>> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// CapabilityRegistry
// ============================================================================

/// One handle per capability kind, sharing an availability policy.
pub struct CapabilityRegistry {
    summarizer: CapabilityHandle<dyn SummarizerSession>,
    rewriter: CapabilityHandle<dyn RewriterSession>,
    language_model: CapabilityHandle<dyn LanguageModelSession>,
}

impl CapabilityRegistry {
    pub fn builder() -> CapabilityRegistryBuilder {
        CapabilityRegistryBuilder::default()
    }

    /// A registry with no providers; every acquisition fails with
    /// `CapabilityUnavailable`.
    pub fn empty() -> Self {
        Self::builder().build()
    }

    #[instrument(name = "registry.acquire", skip_all, fields(capability = "summarizer"))]
    pub async fn summarizer(
        &self,
        monitor: Option<DownloadMonitor>,
    ) -> Result<Arc<dyn SummarizerSession>> {
        self.summarizer.acquire(monitor).await
    }

    #[instrument(name = "registry.acquire", skip_all, fields(capability = "rewriter"))]
    pub async fn rewriter(
        &self,
        monitor: Option<DownloadMonitor>,
    ) -> Result<Arc<dyn RewriterSession>> {
        self.rewriter.acquire(monitor).await
    }

    #[instrument(name = "registry.acquire", skip_all, fields(capability = "language_model"))]
    pub async fn language_model(
        &self,
        monitor: Option<DownloadMonitor>,
    ) -> Result<Arc<dyn LanguageModelSession>> {
        self.language_model.acquire(monitor).await
    }

    /// Query availability for a kind without creating a session.
    #[instrument(name = "registry.probe", skip(self))]
    pub async fn probe(&self, kind: CapabilityKind) -> Availability {
        match kind {
            CapabilityKind::Summarizer => self.summarizer.probe().await,
            CapabilityKind::Rewriter => self.rewriter.probe().await,
            CapabilityKind::LanguageModel => self.language_model.probe().await,
        }
    }

    /// Reset a kind so the next acquisition starts from scratch.
    pub fn invalidate(&self, kind: CapabilityKind) {
        debug!(capability = %kind, "invalidating capability handle");
        match kind {
            CapabilityKind::Summarizer => self.summarizer.invalidate(),
            CapabilityKind::Rewriter => self.rewriter.invalidate(),
            CapabilityKind::LanguageModel => self.language_model.invalidate(),
        }
    }

    pub fn is_ready(&self, kind: CapabilityKind) -> bool {
        match kind {
            CapabilityKind::Summarizer => self.summarizer.is_ready(),
            CapabilityKind::Rewriter => self.rewriter.is_ready(),
            CapabilityKind::LanguageModel => self.language_model.is_ready(),
        }
    }
}

/// Builder for [`CapabilityRegistry`].
#[derive(Default)]
pub struct CapabilityRegistryBuilder {
    summarizer: Option<Arc<SummarizerFactory>>,
    rewriter: Option<Arc<RewriterFactory>>,
    language_model: Option<Arc<LanguageModelFactory>>,
    allow_download: bool,
}

impl CapabilityRegistryBuilder {
    pub fn summarizer(mut self, factory: Arc<SummarizerFactory>) -> Self {
        self.summarizer = Some(factory);
        self
    }

    pub fn rewriter(mut self, factory: Arc<RewriterFactory>) -> Self {
        self.rewriter = Some(factory);
        self
    }

    pub fn language_model(mut self, factory: Arc<LanguageModelFactory>) -> Self {
        self.language_model = Some(factory);
        self
    }

    /// Register one provider for all three capabilities.
    pub fn provider<P>(self, provider: Arc<P>) -> Self
    where
        P: CapabilityFactory<dyn SummarizerSession>
            + CapabilityFactory<dyn RewriterSession>
            + CapabilityFactory<dyn LanguageModelSession>
            + 'static,
    {
        self.summarizer(provider.clone())
            .rewriter(provider.clone())
            .language_model(provider)
    }

    /// Accept `downloadable` / `downloading` capabilities. Default: false.
    pub fn allow_download(mut self, allow: bool) -> Self {
        self.allow_download = allow;
        self
    }

    pub fn build(self) -> CapabilityRegistry {
        CapabilityRegistry {
            summarizer: CapabilityHandle::new(
                CapabilityKind::Summarizer,
                self.summarizer,
                self.allow_download,
            ),
            rewriter: CapabilityHandle::new(
                CapabilityKind::Rewriter,
                self.rewriter,
                self.allow_download,
            ),
            language_model: CapabilityHandle::new(
                CapabilityKind::LanguageModel,
                self.language_model,
                self.allow_download,
            ),
        }
    }
}
