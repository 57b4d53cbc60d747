//! Company settings route handlers.
//!
//! All reads and writes go through the company service, so handlers only
//! ever see the canonical record shape regardless of which legacy columns
//! the row actually populates.

use axum::{Json, extract::State};

use aduana_core::Role;
use aduana_identity::{Company, CompanyPatch};

use crate::error::{AppError, Result};
use crate::middleware::Guarded;
use crate::state::AppState;

/// `GET /api/company` - the signed-in identity's company record.
pub async fn get_company(
    State(state): State<AppState>,
    Guarded(identity): Guarded,
) -> Result<Json<Company>> {
    let company_id = identity
        .company_id()
        .ok_or_else(|| AppError::NotFound("no company on this account".to_owned()))?;

    let company = state.companies().get(company_id).await?;
    Ok(Json(company))
}

/// `PATCH /api/company` - update company settings.
///
/// Admin-only: the patch is applied through the normalizer's write path so
/// every legacy reader observes the change.
pub async fn update_company(
    State(state): State<AppState>,
    Guarded(identity): Guarded,
    Json(patch): Json<CompanyPatch>,
) -> Result<Json<Company>> {
    if identity.role() != Role::Admin {
        return Err(AppError::Forbidden(
            "only admins may change company settings".to_owned(),
        ));
    }

    let company_id = identity
        .company_id()
        .ok_or_else(|| AppError::NotFound("no company on this account".to_owned()))?;

    if patch.is_empty() {
        return Err(AppError::BadRequest("empty patch".to_owned()));
    }

    let company = state.companies().update(company_id, &patch).await?;
    Ok(Json(company))
}
