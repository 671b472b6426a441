//! Mindful - focus and calm browsing companion
//!
//! Scores pages against a stated browsing goal, nudges the user when they
//! drift, and produces gentle page summaries and a mood journal. Three
//! unreliable capability sources sit behind one request interface:
//!
//! - an in-page AI session reached over the [`bridge`]
//! - a privileged [`background`] service reached over a [`command`] channel
//! - the page text itself, for degraded results
//!
//! The [`agent::ContentAgent`] runs the fallback chain with TTL-bounded
//! caching ([`cache`]), per-feature request tokens ([`tokens`]) and drift
//! detection ([`drift`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mindful::agent::{ContentAgent, NullPresenter};
//! use mindful::background::BackgroundService;
//! use mindful::providers::{CapabilityRegistry, OllamaProvider};
//! use mindful::storage::MemoryStore;
//! use mindful::types::{Mode, PageSnapshot};
//!
//! #[tokio::main]
//! async fn main() -> mindful::Result<()> {
//!     let provider = Arc::new(OllamaProvider::new("llama3.2")?);
//!     let registry = CapabilityRegistry::builder().provider(provider).build();
//!     let (background, _server) = mindful::command::channel(
//!         "background",
//!         Arc::new(BackgroundService::new(Arc::new(registry))),
//!     );
//!
//!     let page = PageSnapshot::new("https://example.com", "Example", "Photosynthesis converts light...");
//!     let agent = ContentAgent::builder(
//!         Arc::new(MemoryStore::new()),
//!         background,
//!         Arc::new(page),
//!         Arc::new(NullPresenter),
//!     )
//!     .build();
//!
//!     agent.update_intent("learn about photosynthesis", Mode::Focus);
//!     let outcome = agent.assess_current_page().await?;
//!     println!("{:?}", outcome.value());
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod background;
pub mod bridge;
pub mod cache;
pub mod command;
#[cfg(feature = "cli")]
pub mod config;
pub mod drift;
pub mod error;
pub mod journal;
pub mod providers;
pub mod storage;
pub mod telemetry;
pub mod text;
pub mod tokens;
pub mod types;

pub use agent::{ContentAgent, Presenter, TextExtractor, View};
pub use background::BackgroundService;
pub use bridge::{BridgeConfig, PageBridge, PageResponder};
pub use cache::{CacheConfig, CacheKey, ResultCache};
pub use command::{Command, CommandClient, CommandHandler, Reply};
pub use drift::{DriftConfig, DriftDetector, Nudge, NudgeResponse, NudgeTrigger};
pub use error::{MindfulError, Result};
pub use journal::{Journal, MoodDetector};
pub use providers::{CapabilityRegistry, RetryConfig};
pub use storage::{FileStore, KeyValueStore, MemoryStore, Settings};
pub use tokens::{FeatureTokens, RequestToken};
pub use types::{
    Availability, CalmSummary, CapabilityKind, Feature, FeatureOutcome, Mode, PageSnapshot,
    Provenance, UsefulnessAssessment,
};
