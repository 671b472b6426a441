//! Capability providers and the registry that memoizes their sessions.
//!
//! - [`traits`]: session and factory traits (summarizer, rewriter, language model)
//! - [`registry`]: [`CapabilityRegistry`], coalesced lazy initialization per kind
//! - [`retry`]: [`RetryConfig`] and the shared retry helper
//! - `ollama`: HTTP provider for a local Ollama server (feature `ollama`)

#[cfg(feature = "ollama")]
pub mod ollama;
pub mod registry;
pub mod retry;
pub mod traits;

#[cfg(feature = "ollama")]
pub use ollama::OllamaProvider;
pub use registry::{CapabilityHandle, CapabilityRegistry, CapabilityRegistryBuilder};
pub use retry::RetryConfig;
pub use traits::{
    CapabilityFactory, LanguageModelFactory, LanguageModelSession, RewriterFactory,
    RewriterSession, SummarizerFactory, SummarizerSession,
};
