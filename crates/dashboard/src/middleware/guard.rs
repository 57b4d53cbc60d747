//! Route-guard extractor.
//!
//! The seam between the identity core and the rendering layer: handlers
//! that require an identity take a [`Guarded`] argument, and the guard's
//! terminal state for the navigation is translated into a concrete
//! response - content, a redirect to login, the pending-verification
//! interstitial, or a recoverable error.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;

use aduana_identity::{Identity, RouteState};

use crate::state::AppState;

/// Extractor that runs the route guard for the request path.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     Guarded(identity): Guarded,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", identity.email())
/// }
/// ```
pub struct Guarded(pub Identity);

/// What the visitor gets when the guard does not allow the route.
pub enum GuardRejection {
    /// Redirect to the login page (for page requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Authenticated but unverified; manual confirmation required.
    PendingVerification,
    /// The guard itself failed; recoverable, retry manually.
    Internal,
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Not signed in" })),
            )
                .into_response(),
            Self::PendingVerification => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "state": "pending_verification",
                    "error": "Confirm your email address to continue",
                })),
            )
                .into_response(),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Could not verify your session",
                    "retry": true,
                })),
            )
                .into_response(),
        }
    }
}

impl FromRequestParts<AppState> for Guarded {
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_owned();
        let decision = state.guard().check(&path).await;

        match decision.state {
            RouteState::Allowed => decision.identity.map(Self).ok_or_else(|| {
                // Public paths don't resolve an identity; a handler that
                // demands one on such a path gets an unauthorized response.
                GuardRejection::Unauthorized
            }),
            RouteState::RedirectLogin => {
                if path.starts_with("/api/") {
                    Err(GuardRejection::Unauthorized)
                } else {
                    Err(GuardRejection::RedirectToLogin)
                }
            }
            RouteState::PendingVerification => Err(GuardRejection::PendingVerification),
            RouteState::Checking | RouteState::Error => Err(GuardRejection::Internal),
        }
    }
}
