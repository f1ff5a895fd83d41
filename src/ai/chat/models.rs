//! The core models for managing a stateful chat with an LLM.
use crate::openai::{Message, Role};

/// Models offered in the settings panel. Selection is constrained to
/// this list.
pub const MODELS: &[&str] = &["llama-3.1-8b-instant", "llama-3.1-70b-versatile"];

pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

pub fn is_known_model(model: &str) -> bool {
    MODELS.contains(&model)
}

/// Ordered messages sent to the LLM as context. The first message is
/// always the system message.
#[derive(Clone, Debug, PartialEq)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    pub fn new(system_message: &str) -> Self {
        Self(vec![Message::new(Role::System, system_message)])
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn push(&mut self, msg: Message) {
        self.0.push(msg)
    }

    /// Remove the last message unless it's the system message.
    pub fn pop(&mut self) -> Option<Message> {
        if self.0.len() > 1 { self.0.pop() } else { None }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.0.iter()
    }
}
