//! Cross-context request bridge.
//!
//! The content context cannot reach every capability itself; the page
//! context can. The two talk over a shared message window where every
//! posted message is a JSON [`Envelope`](envelope::Envelope).
//!
//! ```text
//!  content context                          page context
//! ┌──────────────┐   *_REQUEST          ┌───────────────┐
//! │  PageBridge  │ ───────────────────► │ PageResponder │
//! │   pending    │ ◄─────────────────── │   registry    │
//! └──────────────┘   *_STATUS* *_RESULT └───────────────┘
//! ```
//!
//! - [`PageBridge`]: correlates requests and replies, status callbacks, timeouts.
//! - [`PageResponder`]: answers requests with the page's own capabilities.
//! - [`window()`]: an in-process window connecting the two.

pub mod envelope;
mod page_bridge;
mod responder;

pub use envelope::{
    BridgeChannel, Envelope, Message, RequestMetadata, SummaryPayload, UsefulnessPayload,
};
pub use page_bridge::{PageBridge, StatusCallback};
pub use responder::PageResponder;

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::{MindfulError, Result};

/// Configuration for [`PageBridge`].
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// How long to wait for a final result. Default: 25s.
    pub timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(25),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One side of a message window.
pub struct Port {
    outbound: mpsc::UnboundedSender<Value>,
    inbound: mpsc::UnboundedReceiver<Value>,
}

impl Port {
    /// Post a raw message to the other side.
    pub fn post(&self, message: Value) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| MindfulError::Disconnected)
    }

    pub fn into_parts(self) -> (mpsc::UnboundedSender<Value>, mpsc::UnboundedReceiver<Value>) {
        (self.outbound, self.inbound)
    }
}

/// Create a connected pair of ports: `(content side, page side)`.
pub fn window() -> (Port, Port) {
    let (to_page, from_content) = mpsc::unbounded_channel();
    let (to_content, from_page) = mpsc::unbounded_channel();
    (
        Port {
            outbound: to_page,
            inbound: from_page,
        },
        Port {
            outbound: to_content,
            inbound: from_content,
        },
    )
}
