//! Test utilities for integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use axum::{Router, body::Body};

use chatbot::ai::chat::{DEFAULT_MODEL, DEFAULT_SYSTEM_MESSAGE};
use chatbot::api::AppState;
use chatbot::api::app;
use chatbot::core::{AppConfig, ChatError};
use chatbot::openai::{CompletionBackend, CompletionRequest, DeltaStream};

/// How the backend answers one request.
pub enum Reply {
    Deltas(Vec<&'static str>),
    RequestFails,
    FailsAfter(Vec<&'static str>),
}

/// Completion backend that replays canned replies in order, one per
/// request, then answers "ok" once they run out.
#[derive(Clone, Default)]
pub struct StubBackend {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl StubBackend {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replying(deltas: Vec<Vec<&'static str>>) -> Self {
        Self::new(deltas.into_iter().map(Reply::Deltas).collect())
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for StubBackend {
    async fn completion_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<DeltaStream, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Deltas(vec!["ok"]));

        let items: Vec<Result<String, ChatError>> = match reply {
            Reply::Deltas(deltas) => deltas.into_iter().map(|d| Ok(d.to_string())).collect(),
            Reply::RequestFails => return Err(ChatError::api(401, "Invalid API Key")),
            Reply::FailsAfter(deltas) => deltas
                .into_iter()
                .map(|d| Ok(d.to_string()))
                .chain(std::iter::once(Err(ChatError::stream("connection reset"))))
                .collect(),
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        api_hostname: String::from("http://localhost:9999"),
        api_key: String::from("test-api-key"),
        model: String::from(DEFAULT_MODEL),
        system_message: String::from(DEFAULT_SYSTEM_MESSAGE),
    }
}

/// Creates a test application router backed by `backend`.
pub fn test_app_with(backend: StubBackend) -> Router {
    let app_state = AppState::new(Arc::new(backend), test_config());
    app(Arc::new(RwLock::new(app_state)))
}

/// Creates a test application router that answers every message
/// with "ok".
pub fn test_app() -> Router {
    test_app_with(StubBackend::default())
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}
