use std::sync::Arc;

use futures::Stream;
use futures_util::StreamExt;

use super::models::Transcript;
use crate::core::ChatError;
use crate::openai::{CompletionBackend, CompletionRequest, Message, Role};

/// A single conversation with an LLM using an OpenAI compatible chat
/// completion API.
///
/// Holds the model to target, the system message framing the
/// assistant, and the transcript that is sent in full with every
/// turn. The transcript always starts with the system message and
/// grows by one user and one assistant message per completed turn.
pub struct ChatBot {
    backend: Arc<dyn CompletionBackend>,
    model: String,
    system_message: String,
    transcript: Transcript,
}

impl ChatBot {
    pub fn new(backend: Arc<dyn CompletionBackend>, model: &str, system_message: &str) -> Self {
        Self {
            backend,
            model: model.to_string(),
            system_message: system_message.to_string(),
            transcript: Transcript::new(system_message),
        }
    }

    /// Runs the next turn in the chat, returning a stream of the
    /// response so far. Each item is the full response accumulated up
    /// to that point, not just the latest delta.
    ///
    /// The assistant message is only added to the transcript once the
    /// stream is drained. Dropping the stream early leaves the user
    /// message without a reply. If the request fails instead, the user
    /// message is removed again before the error is yielded so a failed
    /// turn leaves the transcript as it was.
    pub fn chat<'a>(
        &'a mut self,
        message: &str,
    ) -> impl Stream<Item = Result<String, ChatError>> + Send + 'a {
        let message = message.to_string();

        async_stream::stream! {
            if message.trim().is_empty() {
                yield Err(ChatError::EmptyMessage);
                return;
            }

            self.transcript.push(Message::new(Role::User, &message));
            let request = CompletionRequest::streaming(&self.model, self.transcript.messages());

            let mut deltas = match self.backend.completion_stream(&request).await {
                Ok(deltas) => deltas,
                Err(e) => {
                    tracing::error!("Completion request failed: {}", e);
                    self.transcript.pop();
                    yield Err(e);
                    return;
                }
            };

            let mut response = String::new();
            while let Some(delta) = deltas.next().await {
                match delta {
                    Ok(delta) => {
                        if delta.is_empty() {
                            continue;
                        }
                        response.push_str(&delta);
                        yield Ok(response.clone());
                    }
                    Err(e) => {
                        tracing::error!("Completion stream failed: {}", e);
                        self.transcript.pop();
                        yield Err(e);
                        return;
                    }
                }
            }

            tracing::debug!(
                "Turn complete for {}: {} chars, transcript has {} messages",
                self.model,
                response.len(),
                self.transcript.len() + 1
            );
            self.transcript.push(Message::new(Role::Assistant, &response));
        }
    }

    /// Drop all history, keeping only the system message.
    pub fn reset_context(&mut self) {
        self.transcript = Transcript::new(&self.system_message);
    }

    /// Takes effect on the next call to `chat`.
    pub fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    /// Changing the system message always resets the transcript.
    pub fn set_system_message(&mut self, system_message: &str) {
        self.system_message = system_message.to_string();
        self.reset_context();
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}
