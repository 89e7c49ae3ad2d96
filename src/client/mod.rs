//! Typed client for the backend API
//!
//! Wraps the three HTTP calls and decodes the send-message SSE stream into
//! typed `ChatEvent`s delivered over a channel. The stream terminates after
//! a `complete` or `error` frame; unparseable frames are skipped.

use anyhow::{anyhow, Result};
use futures::StreamExt;
use reqwest::Client as HttpClient;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::warn;

use crate::journey::JourneySummary;
use crate::server::types::{ChatEvent, InitChatResponse, JourneySummaryResponse};

/// Client-visible chat handle
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
}

pub struct ApiClient {
    http: HttpClient,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.into(),
        }
    }

    /// Create a new chat session
    pub async fn init_chat(&self) -> Result<Session> {
        let response = self
            .http
            .post(format!("{}/api/chat/init", self.base_url))
            .header("Content-Type", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(extract_error_message(response, "初始化聊天失敗").await));
        }

        let init: InitChatResponse = response.json().await?;
        Ok(Session { session_id: init.session_id })
    }

    /// Send a question; the streamed reply arrives as `ChatEvent`s on the
    /// returned channel, ending after `Complete` or `Error`.
    pub async fn send_message(
        &self,
        session: &Session,
        question: &str,
    ) -> Result<mpsc::Receiver<ChatEvent>> {
        let response = self
            .http
            .post(format!("{}/api/chat/send", self.base_url))
            .json(&json!({
                "sessionId": session.session_id,
                "message": question,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(extract_error_message(response, "發送訊息失敗").await));
        }

        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut decoder = SseFrameDecoder::new();

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        for event in decoder.push_chunk(&String::from_utf8_lossy(&bytes)) {
                            let terminal =
                                matches!(event, ChatEvent::Complete | ChatEvent::Error(_));
                            if tx.send(event).await.is_err() || terminal {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(ChatEvent::Error(e.to_string())).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    /// Fetch the structured itinerary summary. All failures collapse to
    /// `None` - a missing summary only degrades the UI.
    pub async fn journey_summary(&self) -> Option<JourneySummary> {
        let response = match self
            .http
            .get(format!("{}/api/journey/summary", self.base_url))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Itinerary summary request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Itinerary summary unavailable: {}", response.status());
            return None;
        }

        match response.json::<JourneySummaryResponse>().await {
            Ok(body) if body.success => body.summary,
            Ok(body) => {
                warn!("Itinerary summary rejected: {}", body.message);
                None
            }
            Err(e) => {
                warn!("Itinerary summary body unreadable: {}", e);
                None
            }
        }
    }
}

/// Pull the `{"error": ...}` message out of a failed response
async fn extract_error_message(response: reqwest::Response, fallback: &str) -> String {
    response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| fallback.to_string())
}

/// Incremental SSE frame decoder. Bytes arrive in arbitrary chunk sizes;
/// frames are only decoded once their terminating newline is seen.
pub struct SseFrameDecoder {
    buffer: String,
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self { buffer: String::new() }
    }

    pub fn push_chunk(&mut self, chunk: &str) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        self.buffer.push_str(chunk);

        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].to_string();
            self.buffer = self.buffer[line_end + 1..].to_string();

            let Some(data) = line.strip_prefix("data: ") else {
                continue; // comments, blank separators
            };
            if data.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<ChatEvent>(data) {
                Ok(event) => events.push(event),
                Err(e) => warn!("Skipping unparseable SSE frame {:?}: {}", data, e),
            }
        }

        events
    }
}

impl Default for SseFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::GroundingSource;

    #[test]
    fn test_decoder_parses_full_frames() {
        let mut decoder = SseFrameDecoder::new();
        let events = decoder.push_chunk(
            "data: {\"type\":\"text\",\"content\":\"你好\"}\n\ndata: {\"type\":\"complete\"}\n\n",
        );
        assert_eq!(
            events,
            vec![ChatEvent::Text("你好".into()), ChatEvent::Complete]
        );
    }

    #[test]
    fn test_decoder_handles_split_frames() {
        let mut decoder = SseFrameDecoder::new();
        assert!(decoder.push_chunk("data: {\"type\":\"te").is_empty());
        assert!(decoder.push_chunk("xt\",\"content\":\"東").is_empty());
        let events = decoder.push_chunk("京\"}\n\n");
        assert_eq!(events, vec![ChatEvent::Text("東京".into())]);
    }

    #[test]
    fn test_decoder_parses_sources_frame() {
        let mut decoder = SseFrameDecoder::new();
        let events = decoder.push_chunk(
            "data: {\"type\":\"sources\",\"content\":[{\"uri\":\"https://a\",\"title\":\"甲\"}]}\n",
        );
        assert_eq!(
            events,
            vec![ChatEvent::Sources(vec![GroundingSource {
                uri: "https://a".into(),
                title: "甲".into(),
            }])]
        );
    }

    #[test]
    fn test_decoder_skips_noise() {
        let mut decoder = SseFrameDecoder::new();
        let events = decoder.push_chunk(
            ": keep-alive\ndata: \ndata: not json\ndata: {\"type\":\"complete\"}\n",
        );
        assert_eq!(events, vec![ChatEvent::Complete]);
    }

    #[test]
    fn test_decoder_keeps_trailing_partial() {
        let mut decoder = SseFrameDecoder::new();
        assert!(decoder.push_chunk("data: {\"type\":\"complete\"}").is_empty());
        let events = decoder.push_chunk("\n");
        assert_eq!(events, vec![ChatEvent::Complete]);
    }
}
