//! In-memory chat session store
//!
//! Sessions hold the system prompt and conversation history that the
//! upstream call replays on every turn. Storage is a process-wide map with a
//! fire-and-forget expiry timer per session; nothing survives a restart.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::provider::{Message, MessageRole};

/// Server-side conversational state behind a client-visible session id.
#[derive(Debug)]
pub struct ChatSession {
    pub id: String,
    pub system_prompt: String,
    pub history: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(system_prompt: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            system_prompt,
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Record a completed exchange so the next upstream call sees it.
    pub fn push_turn(&mut self, user: String, model: String) {
        self.history.push(Message { role: MessageRole::User, content: user });
        self.history.push(Message { role: MessageRole::Model, content: model });
    }
}

type SessionMap = HashMap<String, Arc<Mutex<ChatSession>>>;

/// Process-wide session map. Lookups hand out `Arc<Mutex<ChatSession>>` so a
/// streaming request keeps working on a session even if the expiry timer
/// removes it from the map mid-stream.
#[derive(Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<SessionMap>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a session and arm its expiry timer. Returns the session id.
    pub async fn insert(&self, session: ChatSession, ttl: Duration) -> String {
        let id = session.id.clone();
        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(id.clone(), Arc::new(Mutex::new(session)));
        }

        // Fire-and-forget TTL, mirroring the one-shot timer the session was
        // created with. Lookups do not refresh it. The Weak handle lets the
        // timer die with the store instead of keeping it alive.
        let map = Arc::downgrade(&self.sessions);
        let timer_id = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(map) = map.upgrade() {
                if map.write().await.remove(&timer_id).is_some() {
                    debug!(session_id = %timer_id, "Session expired");
                }
            }
        });

        id
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<ChatSession>>> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// Remove a session; returns whether it was present.
    pub async fn remove(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = SessionStore::new();
        let id = store.insert(ChatSession::new("prompt".into()), LONG_TTL).await;

        let session = store.get(&id).await.expect("session should exist");
        assert_eq!(session.lock().await.system_prompt, "prompt");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let store = SessionStore::new();
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_remove_reports_presence() {
        let store = SessionStore::new();
        let id = store.insert(ChatSession::new("prompt".into()), LONG_TTL).await;

        assert!(store.remove(&id).await);
        assert!(!store.remove(&id).await);
    }

    #[tokio::test]
    async fn test_session_expires_after_ttl() {
        let store = SessionStore::new();
        let id = store
            .insert(ChatSession::new("prompt".into()), Duration::from_millis(50))
            .await;

        assert!(store.get(&id).await.is_some());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.get(&id).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_stream_survives_expiry() {
        // A handle obtained before expiry keeps the session alive for the
        // duration of an in-flight stream.
        let store = SessionStore::new();
        let id = store
            .insert(ChatSession::new("prompt".into()), Duration::from_millis(50))
            .await;

        let handle = store.get(&id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(store.get(&id).await.is_none());
        handle.lock().await.push_turn("q".into(), "a".into());
        assert_eq!(handle.lock().await.history.len(), 2);
    }

    #[tokio::test]
    async fn test_push_turn_appends_roles_in_order() {
        let mut session = ChatSession::new("prompt".into());
        session.push_turn("問題".into(), "回答".into());

        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].role, MessageRole::User);
        assert_eq!(session.history[0].content, "問題");
        assert_eq!(session.history[1].role, MessageRole::Model);
    }
}
