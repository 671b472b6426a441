//! Mindful error types

use std::time::Duration;

/// Mindful error types.
///
/// The type is `Clone` so that a single failed capability initialization
/// can be reported to every caller that was waiting on it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MindfulError {
    // Capability errors (escalate to the next fallback tier)
    /// Provider not present, or it reports a non-available status.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Provider present but the availability check or creation failed.
    #[error("capability initialization failed: {0}")]
    InitializationFailed(String),

    // Bridge errors
    #[error("timed out after {0:?} waiting for a response")]
    Timeout(Duration),

    /// The remote side sent a final message that explicitly signals failure.
    #[error("remote error: {0}")]
    RemoteError(String),

    #[error("command channel disconnected")]
    Disconnected,

    // Data errors
    #[error("no text to process")]
    EmptyInput,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    // Storage errors (callers degrade these to "no cache available")
    #[error("storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("no provider configured")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MindfulError {
    /// Whether this error should escalate to the next fallback tier rather
    /// than being surfaced to the user.
    pub fn is_fallback_trigger(&self) -> bool {
        matches!(
            self,
            MindfulError::CapabilityUnavailable(_)
                | MindfulError::InitializationFailed(_)
                | MindfulError::Timeout(_)
                | MindfulError::RemoteError(_)
                | MindfulError::MalformedResponse(_)
                | MindfulError::Disconnected
                | MindfulError::Http(_)
                | MindfulError::NoProvider
        )
    }

    /// Whether a retry of the same call might succeed.
    ///
    /// Only transport failures qualify; a capability that said "no" will say
    /// it again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MindfulError::Disconnected | MindfulError::Timeout(_) | MindfulError::Http(_)
        )
    }
}

impl From<serde_json::Error> for MindfulError {
    fn from(err: serde_json::Error) -> Self {
        MindfulError::Json(err.to_string())
    }
}

impl From<std::io::Error> for MindfulError {
    fn from(err: std::io::Error) -> Self {
        MindfulError::Storage(err.to_string())
    }
}

/// Result type alias for Mindful operations
pub type Result<T> = std::result::Result<T, MindfulError>;
