use std::env;

use crate::ai::chat::{DEFAULT_MODEL, DEFAULT_SYSTEM_MESSAGE, is_known_model};
use crate::core::ChatError;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_hostname: String,
    pub api_key: String,
    pub model: String,
    pub system_message: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let api_hostname = env::var("CHATBOT_API_HOST")
            .unwrap_or_else(|_| "https://api.groq.com/openai".to_string());
        // Groq is the default backend but any OpenAI compatible API
        // works when pointed at with `CHATBOT_API_HOST`
        let api_key = env::var("GROQ_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .unwrap_or_default();
        let model = env::var("CHATBOT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let system_message = env::var("CHATBOT_SYSTEM_MESSAGE")
            .unwrap_or_else(|_| DEFAULT_SYSTEM_MESSAGE.to_string());

        Self {
            api_hostname,
            api_key,
            model,
            system_message,
        }
    }
}

impl AppConfig {
    /// Override the model and system message, e.g. from CLI flags.
    pub fn with_overrides(mut self, model: Option<String>, system_message: Option<String>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(system_message) = system_message {
            self.system_message = system_message;
        }
        self
    }

    /// Catch settings that would otherwise only fail once the first
    /// session is created.
    pub fn validate(&self) -> Result<(), ChatError> {
        if !is_known_model(&self.model) {
            return Err(ChatError::UnknownModel(self.model.clone()));
        }
        Ok(())
    }
}
