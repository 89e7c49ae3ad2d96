//! Gemini provider
//!
//! Talks to the streamGenerateContent endpoint with `alt=sse` and relays
//! the response chunks over an mpsc channel. Google Search grounding is
//! always requested; grounding chunks are surfaced as `StreamEvent::Grounding`.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{ChatRequest, GroundingSource, MessageRole, Provider, ProviderError, StreamEvent};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct GeminiProvider {
    client: HttpClient,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: HttpClient::new(),
            api_key,
            base_url,
            model,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, self.model, self.api_key
        )
    }

    /// Build Gemini contents from the request: prior turns, then the new input
    fn build_contents(request: &ChatRequest) -> Vec<GeminiContent> {
        let mut contents = Vec::new();

        for msg in &request.messages {
            let role = match msg.role {
                MessageRole::User => "user",
                MessageRole::Model => "model",
            };
            contents.push(GeminiContent {
                role: role.to_string(),
                parts: vec![GeminiPart { text: msg.content.clone() }],
            });
        }

        contents.push(GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart { text: request.input.clone() }],
        });

        contents
    }

    fn build_request(request: &ChatRequest) -> GeminiRequest {
        GeminiRequest {
            contents: Self::build_contents(request),
            system_instruction: Some(GeminiSystemInstruction {
                parts: vec![GeminiPart { text: request.system.clone() }],
            }),
            tools: Some(vec![GeminiTool { google_search: Value::Object(Default::default()) }]),
        }
    }
}

/// Parse one `data:` payload into stream events.
///
/// A chunk can carry text parts, grounding metadata, both, or neither; an
/// unparseable payload yields no events (matching the lenient upstream
/// contract - malformed frames are dropped, not fatal).
fn parse_stream_payload(data: &str) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    let response: GeminiResponse = match serde_json::from_str(data) {
        Ok(r) => r,
        Err(_) => return events,
    };

    if let Some(error) = response.error {
        events.push(StreamEvent::Error(error.message));
        return events;
    }

    if let Some(candidates) = response.candidates {
        for candidate in candidates {
            if let Some(content) = candidate.content {
                for part in content.parts {
                    if let Some(text) = part.text {
                        if !text.is_empty() {
                            events.push(StreamEvent::TextDelta(text));
                        }
                    }
                }
            }

            if let Some(metadata) = candidate.grounding_metadata {
                let sources = extract_sources(metadata.grounding_chunks.unwrap_or_default());
                if !sources.is_empty() {
                    events.push(StreamEvent::Grounding(sources));
                }
            }
        }
    }

    events
}

/// Map grounding chunks to citation links. Only web chunks carry a usable
/// link; a missing title falls back to the uri.
fn extract_sources(chunks: Vec<GeminiGroundingChunk>) -> Vec<GroundingSource> {
    chunks
        .into_iter()
        .filter_map(|chunk| chunk.web)
        .filter_map(|web| {
            web.uri.map(|uri| GroundingSource {
                title: web.title.unwrap_or_else(|| uri.clone()),
                uri,
            })
        })
        .collect()
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn create_stream(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }

        let (tx, rx) = mpsc::channel(100);

        let api_request = Self::build_request(&request);
        let url = self.stream_url();
        let client = self.client.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            match client
                .post(&url)
                .json(&api_request)
                .timeout(timeout)
                .send()
                .await
            {
                Ok(response) => {
                    if !response.status().is_success() {
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        let _ = tx
                            .send(StreamEvent::Error(format!(
                                "Gemini API error: {} - {}",
                                status, body
                            )))
                            .await;
                        return;
                    }

                    let mut stream = response.bytes_stream();
                    let mut buffer = String::new();

                    while let Some(chunk) = stream.next().await {
                        match chunk {
                            Ok(bytes) => {
                                buffer.push_str(&String::from_utf8_lossy(&bytes));

                                // Parse SSE events line by line
                                while let Some(line_end) = buffer.find('\n') {
                                    let line = buffer[..line_end].to_string();
                                    buffer = buffer[line_end + 1..].to_string();

                                    if let Some(data) = line.strip_prefix("data: ") {
                                        for event in parse_stream_payload(data) {
                                            let fatal = matches!(event, StreamEvent::Error(_));
                                            if tx.send(event).await.is_err() || fatal {
                                                return;
                                            }
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                                return;
                            }
                        }
                    }

                    let _ = tx.send(StreamEvent::Done).await;
                }
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                }
            }
        });

        Ok(rx)
    }

    fn name(&self) -> &'static str {
        "Gemini"
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Clone)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Clone)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiTool {
    #[serde(rename = "googleSearch")]
    google_search: Value,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "groundingMetadata")]
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiGroundingMetadata {
    #[serde(rename = "groundingChunks")]
    grounding_chunks: Option<Vec<GeminiGroundingChunk>>,
}

#[derive(Deserialize)]
struct GeminiGroundingChunk {
    web: Option<GeminiWebSource>,
}

#[derive(Deserialize)]
struct GeminiWebSource {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Message;

    fn request() -> ChatRequest {
        ChatRequest {
            system: "你是旅遊顧問".into(),
            messages: vec![
                Message { role: MessageRole::User, content: "淺草怎麼去？".into() },
                Message { role: MessageRole::Model, content: "搭銀座線到淺草站。".into() },
            ],
            input: "附近有什麼好吃的？".into(),
        }
    }

    #[test]
    fn test_build_contents_maps_roles() {
        let contents = GeminiProvider::build_contents(&request());
        assert_eq!(contents.len(), 3); // 2 history + 1 current
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");
        assert_eq!(contents[2].role, "user");
        assert_eq!(contents[2].parts[0].text, "附近有什麼好吃的？");
    }

    #[test]
    fn test_build_request_enables_google_search() {
        let api_request = GeminiProvider::build_request(&request());
        let json = serde_json::to_value(&api_request).unwrap();
        assert_eq!(json["tools"][0]["googleSearch"], serde_json::json!({}));
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "你是旅遊顧問");
    }

    #[test]
    fn test_parse_text_chunk() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"雷門"}],"role":"model"}}]}"#;
        let events = parse_stream_payload(data);
        assert_eq!(events, vec![StreamEvent::TextDelta("雷門".into())]);
    }

    #[test]
    fn test_parse_grounding_chunk() {
        let data = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "營業中"}], "role": "model"},
                "groundingMetadata": {
                    "groundingChunks": [
                        {"web": {"uri": "https://example.com/a", "title": "官網"}},
                        {"web": {"uri": "https://example.com/b"}},
                        {"retrievedContext": {}}
                    ]
                }
            }]
        }"#;
        let events = parse_stream_payload(data);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::TextDelta("營業中".into()));
        match &events[1] {
            StreamEvent::Grounding(sources) => {
                assert_eq!(sources.len(), 2);
                assert_eq!(sources[0].title, "官網");
                // Missing title falls back to the uri
                assert_eq!(sources[1].title, "https://example.com/b");
            }
            other => panic!("expected grounding event, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_payload() {
        let data = r#"{"error":{"message":"API key not valid. Please pass a valid API key."}}"#;
        let events = parse_stream_payload(data);
        assert_eq!(
            events,
            vec![StreamEvent::Error(
                "API key not valid. Please pass a valid API key.".into()
            )]
        );
    }

    #[test]
    fn test_parse_garbage_is_dropped() {
        assert!(parse_stream_payload("not json").is_empty());
        assert!(parse_stream_payload("{}").is_empty());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_rejected() {
        let provider = GeminiProvider::new(
            String::new(),
            "http://localhost".into(),
            "gemini-2.5-flash".into(),
        );
        let result = provider.create_stream(request()).await;
        assert!(matches!(result, Err(ProviderError::MissingApiKey)));
    }
}
