//! Capability session and factory traits.
//!
//! A capability is split in two: a factory that can report availability and
//! create sessions, and the session itself. The registry only ever talks to
//! factories; features only ever talk to sessions.
//!
//! Sessions return loosely shaped JSON. Callers decode it with
//! [`extract_text`](crate::text::extract_text), so a provider may answer with
//! a bare string or any of the object shapes that decoder understands.
//!
//! # Error semantics
//!
//! - `CapabilityUnavailable` from `create` means "not here, try the next tier"
//! - anything else from `create` is reported as `InitializationFailed`
//! - session errors are passed through unchanged

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::types::{Availability, DownloadMonitor};

/// A live summarization session.
#[async_trait]
pub trait SummarizerSession: Send + Sync {
    /// Summarize `input`. `context` is a free-form hint about the audience.
    async fn summarize(&self, input: &str, context: &str) -> Result<Value>;
}

/// A live rewriting session.
#[async_trait]
pub trait RewriterSession: Send + Sync {
    async fn rewrite(&self, input: &str, instructions: &str) -> Result<Value>;
}

/// A live general-purpose prompting session.
#[async_trait]
pub trait LanguageModelSession: Send + Sync {
    async fn prompt(&self, input: &str) -> Result<Value>;
}

/// Creates sessions of type `S` and reports whether it can.
#[async_trait]
pub trait CapabilityFactory<S: ?Sized + Send + Sync>: Send + Sync {
    /// Factory name for logging/debugging.
    fn name(&self) -> &str;

    /// Report availability without creating anything.
    async fn availability(&self) -> Result<Availability>;

    /// Create a session. When the model must be fetched first, progress is
    /// reported through `monitor`.
    async fn create(&self, monitor: Option<DownloadMonitor>) -> Result<Arc<S>>;
}

pub type SummarizerFactory = dyn CapabilityFactory<dyn SummarizerSession>;
pub type RewriterFactory = dyn CapabilityFactory<dyn RewriterSession>;
pub type LanguageModelFactory = dyn CapabilityFactory<dyn LanguageModelSession>;
