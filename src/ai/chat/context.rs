use std::sync::Arc;

use futures::Stream;
use futures_util::StreamExt;

use super::core::ChatBot;
use super::models::is_known_model;
use crate::core::ChatError;
use crate::openai::{CompletionBackend, Message, Role};

/// Everything a chat surface needs to keep between interactions: the
/// current `ChatBot` and the conversation shown to the user.
///
/// The displayed conversation is kept separately from the chatbot's
/// transcript. It never includes the system message and it survives
/// applying new settings, which replaces the chatbot entirely.
pub struct ChatContext {
    backend: Arc<dyn CompletionBackend>,
    chatbot: ChatBot,
    conversation: Vec<Message>,
}

impl ChatContext {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        model: &str,
        system_message: &str,
    ) -> Result<Self, ChatError> {
        if !is_known_model(model) {
            return Err(ChatError::UnknownModel(model.to_string()));
        }
        let chatbot = ChatBot::new(Arc::clone(&backend), model, system_message);
        Ok(Self {
            backend,
            chatbot,
            conversation: Vec::new(),
        })
    }

    /// Replace the chatbot with a new one using the given settings.
    /// The displayed conversation is left as is.
    pub fn apply_settings(&mut self, model: &str, system_message: &str) -> Result<(), ChatError> {
        if !is_known_model(model) {
            return Err(ChatError::UnknownModel(model.to_string()));
        }
        self.chatbot = ChatBot::new(Arc::clone(&self.backend), model, system_message);
        tracing::info!("Applied settings: model={}", model);
        Ok(())
    }

    /// Clear the displayed conversation and the chatbot's history.
    pub fn reset(&mut self) {
        self.conversation.clear();
        self.chatbot.reset_context();
    }

    /// Send a message and stream back the response so far after each
    /// received chunk, keeping the displayed conversation in sync.
    ///
    /// On failure the user's message is removed from the conversation
    /// so it is left in its last consistent state.
    pub fn submit<'a>(
        &'a mut self,
        text: &str,
    ) -> impl Stream<Item = Result<String, ChatError>> + Send + 'a {
        let text = text.to_string();

        async_stream::stream! {
            if text.trim().is_empty() {
                yield Err(ChatError::EmptyMessage);
                return;
            }

            self.conversation.push(Message::new(Role::User, &text));

            let mut response = String::new();
            let mut turn = std::pin::pin!(self.chatbot.chat(&text));
            while let Some(partial) = turn.next().await {
                match partial {
                    Ok(partial) => {
                        response.clone_from(&partial);
                        yield Ok(partial);
                    }
                    Err(e) => {
                        self.conversation.pop();
                        yield Err(e);
                        return;
                    }
                }
            }

            self.conversation.push(Message::new(Role::Assistant, &response));
        }
    }

    /// User and assistant messages in the order they were displayed.
    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    pub fn chatbot(&self) -> &ChatBot {
        &self.chatbot
    }
}
