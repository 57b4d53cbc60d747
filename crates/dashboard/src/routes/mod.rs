//! Route handlers.

pub mod auth;
pub mod company;
pub mod home;
pub mod session;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Assemble all dashboard routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::index))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", post(auth::register))
        .route("/logout", post(auth::logout))
        .route("/guest", post(auth::enter_guest_mode).delete(auth::leave_guest_mode))
        .route("/api/session", get(session::current_session))
        .route("/api/company", get(company::get_company).patch(company::update_company))
}
