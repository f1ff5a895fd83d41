//! Public types for the chat page
use serde::{Deserialize, Serialize};

use crate::ai::chat::MODELS;
use crate::api::state::SessionView;
use crate::openai::Message;

pub const PAGE_TITLE: &str = "🤖 AI Chatbot";

#[derive(Deserialize)]
pub struct PageParams {
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ModelOption {
    pub name: String,
    pub selected: bool,
}

/// Everything rendered on the chat page
#[derive(Serialize)]
pub struct PageData {
    pub title: String,
    pub session_id: String,
    pub models: Vec<ModelOption>,
    pub system_message: String,
    pub conversation: Vec<Message>,
}

impl PageData {
    pub fn new(session_id: &str, view: SessionView) -> Self {
        Self {
            title: PAGE_TITLE.to_string(),
            session_id: session_id.to_string(),
            models: MODELS
                .iter()
                .map(|m| ModelOption {
                    name: m.to_string(),
                    selected: *m == view.model,
                })
                .collect(),
            system_message: view.system_message,
            conversation: view.conversation,
        }
    }
}
