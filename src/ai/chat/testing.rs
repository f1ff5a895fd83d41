//! In-memory completion backend for unit tests.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::ChatError;
use crate::openai::{CompletionBackend, CompletionRequest, DeltaStream};

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
