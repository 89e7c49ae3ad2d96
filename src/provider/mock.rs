//! Scripted provider for tests
//!
//! Replays a configured event sequence instead of calling the network, and
//! records the last request so tests can assert on what the relay sent
//! upstream.

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;

use super::{ChatRequest, Provider, ProviderError, StreamEvent};

pub struct MockProvider {
    script: Mutex<Vec<StreamEvent>>,
    last_request: Mutex<Option<ChatRequest>>,
    call_count: Mutex<usize>,
}

impl MockProvider {
    pub fn new(script: Vec<StreamEvent>) -> Self {
        Self {
            script: Mutex::new(script),
            last_request: Mutex::new(None),
            call_count: Mutex::new(0),
        }
    }

    /// Replace the scripted event sequence for subsequent calls
    pub fn set_script(&self, script: Vec<StreamEvent>) {
        *self.script.lock().expect("mock script lock") = script;
    }

    /// The request from the most recent `create_stream` call
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().expect("mock request lock").clone()
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().expect("mock count lock")
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn create_stream(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>, ProviderError> {
        *self.last_request.lock().expect("mock request lock") = Some(request);
        *self.call_count.lock().expect("mock count lock") += 1;

        let script = self.script.lock().expect("mock script lock").clone();
        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            for event in script {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    fn name(&self) -> &'static str {
        "Mock"
    }
}
