//! Dashboard landing route.

use axum::Json;
use serde::Serialize;

use aduana_core::Role;

use crate::middleware::Guarded;

/// Summary of the signed-in (or guest) visitor for the dashboard chrome.
#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub email: String,
    pub role: Role,
    pub guest: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
}

/// `GET /` - protected landing route.
pub async fn index(Guarded(identity): Guarded) -> Json<HomeResponse> {
    Json(HomeResponse {
        email: identity.email().as_str().to_owned(),
        role: identity.role(),
        guest: identity.is_guest(),
        company_id: identity.company_id().map(|id| id.as_str().to_owned()),
    })
}
