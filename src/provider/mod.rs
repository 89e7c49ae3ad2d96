//! Provider abstraction for the upstream chat model
//!
//! Gemini is the production backend; the mock provider exists so the
//! SSE relay path can be exercised without network access.

mod gemini;
mod mock;

pub use gemini::GeminiProvider;
pub use mock::MockProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Failures opening an upstream stream. Mid-stream failures arrive as
/// `StreamEvent::Error` instead, so the frames already sent stay intact.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("GEMINI_API_KEY not set")]
    MissingApiKey,
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Unified provider trait for streaming chat backends
#[async_trait]
pub trait Provider: Send + Sync {
    /// Open a streaming completion for the given request. Events arrive on
    /// the returned channel; the stream ends with `Done` or `Error`.
    async fn create_stream(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>, ProviderError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// A single conversation turn, as replayed to the upstream on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Model,
}

/// Streaming chat request: system prompt, prior turns, and the new input.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub input: String,
}

/// A web citation attached by the upstream when it grounded the answer
/// with a search. Not deduplicated; order follows the upstream response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// Events emitted by a provider stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental text from the model
    TextDelta(String),
    /// Grounding sources seen on a response chunk (latest set wins)
    Grounding(Vec<GroundingSource>),
    /// Upstream failure; terminates the stream
    Error(String),
    /// Stream finished normally
    Done,
}
