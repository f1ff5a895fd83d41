use thiserror::Error;

/// Errors raised while talking to the completion API or driving a
/// chat turn.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Missing API key. Set GROQ_API_KEY or OPENAI_API_KEY")]
    MissingApiKey,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Completion API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed stream: {0}")]
    Stream(String),
}

impl ChatError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    /// Errors caused by the caller's input rather than the backend.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::EmptyMessage | Self::UnknownModel(_))
    }
}
