//! Router for the chat API

use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response, sse::Event, sse::KeepAlive, sse::Sse},
    routing::{get, post},
};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::public;
use crate::ai::chat::{DEFAULT_MODEL, DEFAULT_SYSTEM_MESSAGE, MODELS};
use crate::api::public::ApiError;
use crate::api::state::{AppState, Session};
use crate::core::ChatError;

type SharedState = Arc<RwLock<AppState>>;

fn session(state: &SharedState, session_id: &str) -> Result<Session, ChatError> {
    state
        .write()
        .expect("Unable to write share state")
        .session(session_id)
}

fn not_found(session_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        format!("Chat session {} not found", session_id),
    )
        .into_response()
}

fn busy(session_id: &str) -> Response {
    (
        StatusCode::CONFLICT,
        format!("Chat session {} is already responding", session_id),
    )
        .into_response()
}

fn sse_event(name: &str, data: &impl serde::Serialize) -> Event {
    let data = serde_json::to_string(data).unwrap_or_else(|_| String::from("{}"));
    Event::default().event(name).data(data)
}

/// List the models that can be selected
pub async fn models() -> Json<public::ModelsResponse> {
    Json(public::ModelsResponse {
        models: MODELS.iter().map(|m| m.to_string()).collect(),
        default_model: DEFAULT_MODEL.to_string(),
        default_system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
    })
}

/// Get the settings and displayed conversation for a session. Doesn't
/// wait for a turn in progress to finish.
async fn chat_session(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Response {
    let found = state
        .write()
        .expect("Unable to write share state")
        .find_session(&session_id);
    let Some(session) = found else {
        return not_found(&session_id);
    };

    Json(public::ChatSessionResponse::new(&session_id, session.view())).into_response()
}

/// Replace the session's chatbot with one using the new settings
async fn apply_settings(
    State(state): State<SharedState>,
    Json(payload): Json<public::ChatSettingsRequest>,
) -> Result<Response, ApiError> {
    let session = session(&state, &payload.session_id)?;
    let Ok(mut ctx) = session.try_lock() else {
        return Ok(busy(&payload.session_id));
    };

    ctx.apply_settings(&payload.model, &payload.system_message)?;
    session.publish(&ctx);
    drop(ctx);

    let resp = public::ChatSessionResponse::new(&payload.session_id, session.view());
    Ok(Json(resp).into_response())
}

/// Clear the conversation and the chatbot's history
async fn reset(
    State(state): State<SharedState>,
    Json(payload): Json<public::ChatResetRequest>,
) -> Result<Response, ApiError> {
    let session = session(&state, &payload.session_id)?;
    let Ok(mut ctx) = session.try_lock() else {
        return Ok(busy(&payload.session_id));
    };

    ctx.reset();
    session.publish(&ctx);
    drop(ctx);
    tracing::info!("Reset chat session {}", payload.session_id);

    let resp = public::ChatSessionResponse::new(&payload.session_id, session.view());
    Ok(Json(resp).into_response())
}

/// Send a message and stream the response so far as it's generated
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<public::ChatRequest>,
) -> Result<Response, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ChatError::EmptyMessage.into());
    }

    let session = session(&state, &payload.session_id)?;
    // Only one turn at a time per session, otherwise both would race
    // to update the transcript
    let Ok(mut ctx) = session.try_lock() else {
        return Ok(busy(&payload.session_id));
    };

    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    let sse_stream = UnboundedReceiverStream::new(rx).map(Ok::<Event, Infallible>);

    // The turn runs to completion even if the client disconnects so
    // that the conversation stays in sync with the transcript
    tokio::spawn(async move {
        let session_id = payload.session_id;
        let result = {
            let mut turn = Box::pin(ctx.submit(&payload.message));
            let mut response = String::new();
            loop {
                match turn.next().await {
                    Some(Ok(partial)) => {
                        let _ = tx.send(sse_event(
                            "partial",
                            &public::ChatChunk {
                                content: partial.clone(),
                            },
                        ));
                        response = partial;
                    }
                    Some(Err(e)) => break Err(e),
                    None => break Ok(response),
                }
            }
        };

        // Release the session before the stream ends so the client can
        // send the next message right away
        session.publish(&ctx);
        drop(ctx);

        match result {
            Ok(response) => {
                let _ = tx.send(sse_event("done", &public::ChatChunk { content: response }));
            }
            Err(e) => {
                tracing::error!("Chat handler error for session {}: {}", session_id, e);
                let _ = tx.send(sse_event(
                    "error",
                    &public::ChatStreamError {
                        error: format!("Something went wrong: {}", e),
                    },
                ));
            }
        }
    });

    let resp = Sse::new(sse_stream)
        .keep_alive(
            KeepAlive::default()
                .text("keep-alive")
                .interval(Duration::from_secs(15)),
        )
        .into_response();

    Ok(resp)
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .route("/settings", post(apply_settings))
        .route("/reset", post(reset))
        .route("/{session_id}", get(chat_session))
}
