//! Authentication route handlers.
//!
//! Sign-in, registration, sign-out, and guest-mode entry/exit against the
//! remote identity service. Every identity change invalidates the cached
//! resolution so the next navigation re-verifies, and a successful sign-in
//! restores the route the visitor was originally heading to.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;

use aduana_identity::{BackendError, Identity, IdentityBackend};

use crate::error::{AppError, Result};
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Sign-in request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Response to a successful sign-in.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Where the client should navigate next; the route the visitor was
    /// redirected away from, when one was recorded.
    pub redirect_to: String,
}

/// Response to a registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    /// `true` when the account still needs email confirmation before the
    /// guard will allow protected routes.
    pub confirmation_required: bool,
}

/// Response to entering guest mode.
#[derive(Debug, Serialize)]
pub struct GuestResponse {
    pub identity: Identity,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /login` - login form descriptor for the thin client.
///
/// Unconditionally reachable; the guard treats the login path as public to
/// avoid redirect loops.
pub async fn login_page() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "form": "login",
        "fields": ["email", "password"],
        "register": "/register",
    }))
}

/// `POST /login` - sign in with email and password.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let session = state
        .backend()
        .sign_in_with_password(&request.email, &request.password)
        .await
        .map_err(|e| match e {
            // GoTrue reports a bad email/password as a 4xx grant failure.
            BackendError::Unauthorized | BackendError::Status { status: 400, .. } => {
                AppError::Unauthorized("Invalid credentials".to_owned())
            }
            other => AppError::Backend(other),
        })?;

    // Signing in is an explicit choice to stop being a guest.
    state.guests().clear()?;
    state.invalidate_identity();

    let redirect_to = state
        .guard()
        .take_last_route()?
        .unwrap_or_else(|| "/".to_owned());

    info!(user_id = %session.user.id, "signed in");
    Ok(Json(LoginResponse { redirect_to }))
}

/// `POST /register` - create an account.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    let metadata = request.display_name.map_or_else(
        || serde_json::json!({}),
        |name| serde_json::json!({ "display_name": name }),
    );

    let session = state
        .backend()
        .sign_up(&request.email, &request.password, metadata)
        .await
        .map_err(|e| match e {
            BackendError::Status { status: 400 | 422, body } => AppError::BadRequest(body),
            other => AppError::Backend(other),
        })?;

    state.guests().clear()?;
    state.invalidate_identity();

    info!(user_id = %session.user.id, "registered");
    Ok(Json(RegisterResponse {
        confirmation_required: !session.user.email_verified,
    }))
}

/// `POST /logout` - terminate the remote session and local caches.
pub async fn logout(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    // An already-dead remote session still signs out locally.
    if let Err(error) = state.backend().sign_out().await
        && error.is_transient()
    {
        tracing::warn!(%error, "remote sign-out failed; local session cleared anyway");
    }

    state.invalidate_identity();

    info!("signed out");
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `POST /guest` - enter guest mode.
pub async fn enter_guest_mode(State(state): State<AppState>) -> Result<Json<GuestResponse>> {
    let guest = state.guests().create()?;
    state.invalidate_identity();

    info!(guest_id = %guest.id, "entered guest mode");
    Ok(Json(GuestResponse {
        identity: Identity::Guest(guest),
    }))
}

/// `DELETE /guest` - leave guest mode, destroying the guest record.
pub async fn leave_guest_mode(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    state.guests().clear()?;
    state.invalidate_identity();

    info!("left guest mode");
    Ok(Json(serde_json::json!({ "ok": true })))
}
