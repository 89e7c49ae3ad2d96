//! Server types for the HTTP API
//!
//! Request/response bodies and the SSE event frames. The frame encoding is
//! adjacently tagged (`type` + `content`) so each `data:` payload is exactly
//! `{"type":"text","content":...}` and friends - the protocol the browser
//! client speaks.

use serde::{Deserialize, Serialize};

use crate::journey::JourneySummary;
use crate::provider::GroundingSource;

/// API version for capability detection
pub const API_VERSION: &str = "2026.7.1";

// ============================================================================
// SSE Event Types
// ============================================================================

/// Events sent to the frontend via SSE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum ChatEvent {
    /// Streaming text from the model
    Text(String),
    /// Web-grounding citations, sent once before completion
    Sources(Vec<GroundingSource>),
    /// Stream finished normally
    Complete,
    /// Stream aborted; the message is user-facing
    Error(String),
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response to a successful session init
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitChatResponse {
    pub session_id: String,
}

/// Chat request from the frontend. Fields are optional so missing ones can
/// be answered with the protocol's 400 body instead of a generic 422.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Envelope for the itinerary summary endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct JourneySummaryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<JourneySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
}
