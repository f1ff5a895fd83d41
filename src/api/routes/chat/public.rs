//! Public types for the chat API
use serde::{Deserialize, Serialize};

use crate::api::state::SessionView;
use crate::openai::Message;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Deserialize)]
pub struct ChatSettingsRequest {
    pub session_id: String,
    pub model: String,
    pub system_message: String,
}

#[derive(Deserialize)]
pub struct ChatResetRequest {
    pub session_id: String,
}

#[derive(Serialize, Deserialize)]
pub struct ChatSessionResponse {
    pub session_id: String,
    pub model: String,
    pub system_message: String,
    pub conversation: Vec<Message>,
}

impl ChatSessionResponse {
    pub fn new(session_id: &str, view: SessionView) -> Self {
        Self {
            session_id: session_id.to_string(),
            model: view.model,
            system_message: view.system_message,
            conversation: view.conversation,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default_model: String,
    pub default_system_message: String,
}

/// Payload of `partial` and `done` events in the chat response stream
#[derive(Serialize, Deserialize)]
pub struct ChatChunk {
    pub content: String,
}

/// Payload of the `error` event in the chat response stream
#[derive(Serialize, Deserialize)]
pub struct ChatStreamError {
    pub error: String,
}
