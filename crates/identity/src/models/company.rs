//! Company (tenant) domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use aduana_core::CompanyId;

/// The canonical shape of a company record.
///
/// The underlying `companies` relation holds several of these facts under
/// two column names and sometimes a third copy nested in `settings`; this
/// struct only ever exists post-normalization, so every field has exactly
/// one authoritative value. Missing facts are empty strings, not `None`,
/// matching what the consuming forms expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    /// Row id.
    pub id: CompanyId,
    /// Company display name.
    pub display_name: String,
    /// Tax identifier (RFC).
    pub tax_id: String,
    /// Country of registration.
    pub country: String,
    /// Postal address.
    pub address: String,
    /// Contact phone.
    pub phone: String,
    /// Public website URL.
    pub website: String,
    /// Logo image URL.
    pub logo_url: String,
    /// Free-form settings map, carried as-is.
    pub settings: Map<String, Value>,
    /// Row creation time, when the store reports one.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time, when the store reports one.
    pub updated_at: Option<DateTime<Utc>>,
}

/// A partial update to the canonical company fields.
///
/// Only the fields that are `Some` are changed; the write path re-asserts
/// the rest from the current record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompanyPatch {
    /// New display name.
    pub display_name: Option<String>,
    /// New tax identifier.
    pub tax_id: Option<String>,
    /// New country.
    pub country: Option<String>,
    /// New address.
    pub address: Option<String>,
    /// New phone.
    pub phone: Option<String>,
    /// New website.
    pub website: Option<String>,
    /// New logo URL.
    pub logo_url: Option<String>,
}

impl CompanyPatch {
    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.tax_id.is_none()
            && self.country.is_none()
            && self.address.is_none()
            && self.phone.is_none()
            && self.website.is_none()
            && self.logo_url.is_none()
    }
}
