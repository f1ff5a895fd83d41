//! API routes module

pub mod chat;
pub mod web;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::{Router, routing::get};

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Chat routes
        .nest("/chat", chat::router())
        // Available models and defaults for the settings panel
        .route("/models", get(chat::models))
}
