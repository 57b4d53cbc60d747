//! Session inspection endpoint.

use axum::{Json, extract::State};
use serde::Serialize;

use aduana_identity::Identity;

use crate::state::AppState;

/// The current resolution result, including the resolver's side-channel
/// error when the last cycle produced no identity.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub identity: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `GET /api/session` - resolve and report the current identity.
///
/// This endpoint deliberately bypasses the route guard: the client uses it
/// to render its account widget and must always get an answer, signed in
/// or not.
pub async fn current_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let identity = state.resolver().resolve().await;
    let error = if identity.is_none() {
        state.resolver().last_error().map(|e| e.to_string())
    } else {
        None
    };

    Json(SessionResponse { identity, error })
}
