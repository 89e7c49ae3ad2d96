//! HTTP handlers: status, session init, streaming send, itinerary summary

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::Stream;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use super::error::{ApiError, ApiResult};
use super::types::{ChatEvent, InitChatResponse, JourneySummaryResponse, SendMessageRequest};
use super::AppState;
use crate::journey::parse_journey;
use crate::prompt::build_system_prompt;
use crate::provider::{ChatRequest, GroundingSource, Provider, StreamEvent};
use crate::session::ChatSession;

/// Health check and status endpoint
pub async fn status_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "provider": state.provider.name(),
        "active_sessions": state.sessions.len().await,
        "version": super::API_VERSION,
    }))
}

/// Create a chat session: assemble the system prompt (with the itinerary
/// embedded when available), store the session, and arm its expiry timer.
pub async fn chat_init_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<InitChatResponse>> {
    if state.api_key.trim().is_empty() {
        return Err(ApiError::internal("API 金鑰未設定。請聯繫開發者。"));
    }

    let journey = match tokio::fs::read_to_string(&state.journey_path).await {
        Ok(content) => content,
        Err(e) => {
            // The advisor still works without an itinerary, just less personal
            warn!(path = %state.journey_path.display(), "Itinerary file unreadable: {}", e);
            String::new()
        }
    };

    let session = ChatSession::new(build_system_prompt(&journey));
    let session_id = state.sessions.insert(session, state.session_ttl).await;

    info!(session_id = %session_id, "Chat session created");
    Ok(Json(InitChatResponse { session_id }))
}

/// Send a message on an existing session; the reply streams back as SSE
/// frames (text / sources / complete / error).
pub async fn chat_send_handler(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    if state.api_key.trim().is_empty() {
        return Err(ApiError::internal("API 金鑰未設定。請聯繫開發者。"));
    }

    let (session_id, message) = match (request.session_id, request.message) {
        (Some(s), Some(m)) if !s.is_empty() && !m.is_empty() => (s, m),
        _ => return Err(ApiError::bad_request("缺少必要的參數。")),
    };

    let session = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| ApiError::not_found("聊天會話已過期，請重新初始化。"))?;

    let (tx, rx) = mpsc::channel::<ChatEvent>(64);
    let provider = state.provider.clone();

    tokio::spawn(async move {
        if let Err(e) = relay_chat(provider, session, message, tx.clone()).await {
            error!(session_id = %session_id, "Chat relay failed: {}", e);
            let _ = tx.send(ChatEvent::Error(map_upstream_error(&e.to_string()))).await;
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| Event::default().json_data(&event));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Forward the upstream token stream to the SSE channel, then record the
/// completed turn in the session history.
///
/// Grounding metadata can arrive on any chunk; the latest non-empty set wins
/// and is emitted once, right before the completion frame.
async fn relay_chat(
    provider: Arc<dyn Provider>,
    session: Arc<Mutex<ChatSession>>,
    message: String,
    tx: mpsc::Sender<ChatEvent>,
) -> anyhow::Result<()> {
    let (system, history) = {
        let session = session.lock().await;
        (session.system_prompt.clone(), session.history.clone())
    };

    let mut upstream = provider
        .create_stream(ChatRequest {
            system,
            messages: history,
            input: message.clone(),
        })
        .await?;

    let mut full_text = String::new();
    let mut latest_sources: Vec<GroundingSource> = Vec::new();

    while let Some(event) = upstream.recv().await {
        match event {
            StreamEvent::TextDelta(delta) => {
                full_text.push_str(&delta);
                tx.send(ChatEvent::Text(delta)).await?;
            }
            StreamEvent::Grounding(sources) => {
                if !sources.is_empty() {
                    latest_sources = sources;
                }
            }
            StreamEvent::Error(raw) => {
                tx.send(ChatEvent::Error(map_upstream_error(&raw))).await?;
                return Ok(());
            }
            StreamEvent::Done => break,
        }
    }

    if !latest_sources.is_empty() {
        tx.send(ChatEvent::Sources(latest_sources)).await?;
    }
    tx.send(ChatEvent::Complete).await?;

    session.lock().await.push_turn(message, full_text);

    Ok(())
}

/// Map raw upstream failures to the user-facing wording
fn map_upstream_error(raw: &str) -> String {
    if raw.contains("API key not valid") {
        "API 金鑰無效。請檢查您的 API 金鑰設定。".to_string()
    } else {
        format!("與 AI 溝通時發生串流錯誤：{}", raw)
    }
}

/// Structured itinerary summary. The file is the canonical source and is
/// re-read and re-parsed on every request.
pub async fn journey_summary_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<JourneySummaryResponse>) {
    match tokio::fs::read_to_string(&state.journey_path).await {
        Ok(content) => {
            let summary = parse_journey(&content);
            (
                StatusCode::OK,
                Json(JourneySummaryResponse {
                    success: true,
                    summary: Some(summary),
                    error: None,
                    message: "行程摘要讀取成功".to_string(),
                }),
            )
        }
        Err(e) => {
            error!(path = %state.journey_path.display(), "Failed to read itinerary: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(JourneySummaryResponse {
                    success: false,
                    summary: None,
                    error: Some("無法讀取行程資訊".to_string()),
                    message: "請確認 journey.txt 文件存在且格式正確".to_string(),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    fn session_with(system: &str) -> Arc<Mutex<ChatSession>> {
        Arc::new(Mutex::new(ChatSession::new(system.to_string())))
    }

    async fn collect_events(mut rx: mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_relay_forwards_text_then_completes() {
        let provider = Arc::new(MockProvider::new(vec![
            StreamEvent::TextDelta("淺草".into()),
            StreamEvent::TextDelta("很好逛".into()),
            StreamEvent::Done,
        ]));
        let session = session_with("prompt");
        let (tx, rx) = mpsc::channel(16);

        relay_chat(provider, session.clone(), "推薦景點".into(), tx)
            .await
            .unwrap();

        let events = collect_events(rx).await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Text("淺草".into()),
                ChatEvent::Text("很好逛".into()),
                ChatEvent::Complete,
            ]
        );

        // The completed turn lands in the session history
        let session = session.lock().await;
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].content, "推薦景點");
        assert_eq!(session.history[1].content, "淺草很好逛");
    }

    #[tokio::test]
    async fn test_relay_sends_latest_sources_before_complete() {
        let early = vec![GroundingSource { uri: "https://a".into(), title: "a".into() }];
        let late = vec![
            GroundingSource { uri: "https://b".into(), title: "b".into() },
            GroundingSource { uri: "https://c".into(), title: "c".into() },
        ];
        let provider = Arc::new(MockProvider::new(vec![
            StreamEvent::Grounding(early),
            StreamEvent::TextDelta("營業中".into()),
            StreamEvent::Grounding(late.clone()),
            StreamEvent::Done,
        ]));
        let (tx, rx) = mpsc::channel(16);

        relay_chat(provider, session_with("p"), "q".into(), tx).await.unwrap();

        let events = collect_events(rx).await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Text("營業中".into()),
                ChatEvent::Sources(late),
                ChatEvent::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_relay_empty_grounding_does_not_clear_sources() {
        let sources = vec![GroundingSource { uri: "https://a".into(), title: "a".into() }];
        let provider = Arc::new(MockProvider::new(vec![
            StreamEvent::Grounding(sources.clone()),
            StreamEvent::Grounding(vec![]),
            StreamEvent::Done,
        ]));
        let (tx, rx) = mpsc::channel(16);

        relay_chat(provider, session_with("p"), "q".into(), tx).await.unwrap();

        let events = collect_events(rx).await;
        assert_eq!(events, vec![ChatEvent::Sources(sources), ChatEvent::Complete]);
    }

    #[tokio::test]
    async fn test_relay_error_ends_stream_without_complete() {
        let provider = Arc::new(MockProvider::new(vec![
            StreamEvent::TextDelta("部分".into()),
            StreamEvent::Error("boom".into()),
        ]));
        let session = session_with("p");
        let (tx, rx) = mpsc::channel(16);

        relay_chat(provider, session.clone(), "q".into(), tx).await.unwrap();

        let events = collect_events(rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ChatEvent::Text("部分".into()));
        assert!(matches!(&events[1], ChatEvent::Error(m) if m.contains("boom")));

        // A failed turn is not recorded
        assert!(session.lock().await.history.is_empty());
    }

    #[tokio::test]
    async fn test_relay_replays_history_upstream() {
        let provider = Arc::new(MockProvider::new(vec![StreamEvent::Done]));
        let session = session_with("p");
        session.lock().await.push_turn("之前的問題".into(), "之前的回答".into());
        let (tx, _rx) = mpsc::channel(16);

        relay_chat(provider.clone(), session, "新問題".into(), tx).await.unwrap();

        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.input, "新問題");
        assert_eq!(request.system, "p");
    }

    #[test]
    fn test_map_upstream_error() {
        assert_eq!(
            map_upstream_error("API key not valid. Please pass a valid API key."),
            "API 金鑰無效。請檢查您的 API 金鑰設定。"
        );
        assert!(map_upstream_error("connection reset").contains("connection reset"));
    }
}
