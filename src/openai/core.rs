use std::{pin::Pin, time::Duration};

use async_trait::async_trait;
use futures::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::sse::SseBuffer;
use crate::core::ChatError;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

// Generation parameters are fixed for every request
pub const TEMPERATURE: f32 = 1.0;
pub const MAX_TOKENS: u32 = 8000;
pub const TOP_P: f32 = 1.0;

/// Payload for an OpenAI compatible `/v1/chat/completions` request.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub stream: bool,
    // Always sent, even when empty, to match what the API expects
    pub stop: Option<Vec<String>>,
}

impl CompletionRequest {
    pub fn streaming(model: &str, messages: &[Message]) -> Self {
        Self {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            top_p: TOP_P,
            stream: true,
            stop: None,
        }
    }
}

/// Content deltas in the order they were received. Ends when the
/// backend signals completion.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Anything that can stream a chat completion. The HTTP client is the
/// real implementation; tests swap in canned responses.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn completion_stream(&self, request: &CompletionRequest)
    -> Result<DeltaStream, ChatError>;
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    id: Option<String>,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompletionChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// Providers report failures after the stream has started as an SSE
// event with an `error` object instead of a chunk.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StreamEvent {
    Error { error: ApiErrorBody },
    Chunk(CompletionChunk),
}

/// Extract the error message from a non-2xx response body, falling back
/// to the raw body when it isn't the usual `{"error": {...}}` shape.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parse a single SSE data payload. Returns `None` for the `[DONE]`
/// sentinel and `Some("")` for chunks that carry no content.
fn parse_event(data: &str) -> Result<Option<String>, ChatError> {
    if data == "[DONE]" {
        return Ok(None);
    }

    let event = serde_json::from_str::<StreamEvent>(data).inspect_err(|e| {
        tracing::error!("Parsing completion chunk failed for {}\nError:{}", data, e)
    })?;

    match event {
        StreamEvent::Error { error } => Err(ChatError::api(500, error.message)),
        StreamEvent::Chunk(chunk) => {
            // Usage-only chunks have no choices
            let Some(choice) = chunk.choices.into_iter().next() else {
                return Ok(Some(String::new()));
            };
            if let Some(reason) = &choice.finish_reason {
                tracing::debug!(
                    "Completion {} from {} finished: {}",
                    chunk.id.as_deref().unwrap_or("-"),
                    chunk.model.as_deref().unwrap_or("-"),
                    reason
                );
            }
            Ok(Some(choice.delta.content.unwrap_or_default()))
        }
    }
}

/// Turn an SSE response body into a stream of content deltas.
pub fn delta_stream<S, B>(body: S) -> DeltaStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    Box::pin(deltas(body))
}

fn deltas<S, B>(body: S) -> impl Stream<Item = Result<String, ChatError>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    async_stream::try_stream! {
        let mut body = Box::pin(body);
        let mut buffer = SseBuffer::new();

        'outer: while let Some(chunk) = body.next().await {
            buffer.push(chunk?.as_ref());

            while let Some(data) = buffer.next_data() {
                match parse_event(&data)? {
                    Some(delta) => yield delta,
                    None => break 'outer,
                }
            }
        }

        // The body can end without a trailing blank line
        if let Some(data) = buffer.finish() {
            if let Some(delta) = parse_event(&data)? {
                yield delta;
            }
        }
    }
}

/// Client for an OpenAI compatible chat completion API such as Groq.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_hostname: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_hostname: &str, api_key: &str) -> Result<Self, ChatError> {
        if api_key.trim().is_empty() {
            return Err(ChatError::MissingApiKey);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.api_hostname.trim_end_matches("/")
        )
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn completion_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<DeltaStream, ChatError> {
        tracing::debug!(
            "Requesting completion from {} with {} messages",
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(60 * 5))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Completion request failed with {}: {}", status, body);
            return Err(ChatError::api(status.as_u16(), error_message(&body)));
        }

        Ok(delta_stream(response.bytes_stream()))
    }
}
