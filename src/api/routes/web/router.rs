//! Router for the chat page

use std::sync::{Arc, RwLock};

use axum::{
    Router,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::Query;
use uuid::Uuid;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::api::templates::Page;

type SharedState = Arc<RwLock<AppState>>;

/// Render the chat page for a session. Visiting without a session ID
/// starts a new session.
async fn index(
    State(state): State<SharedState>,
    Query(params): Query<public::PageParams>,
) -> Result<Response, ApiError> {
    let Some(session_id) = params.session_id.filter(|id| !id.is_empty()) else {
        let url = format!("/?session_id={}", Uuid::new_v4());
        return Ok(Redirect::to(&url).into_response());
    };

    let session = state
        .write()
        .expect("Unable to write share state")
        .session(&session_id)?;
    // Rendered from the view so reloading mid-turn shows the
    // conversation as of the last completed turn
    let data = public::PageData::new(&session_id, session.view());

    let html = state
        .read()
        .expect("Unable to read share state")
        .templates
        .render(&Page::Index.to_string(), &data)?;

    Ok(Html(html).into_response())
}

/// Create the page router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(index))
}
