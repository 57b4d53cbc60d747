//! Cached company fetch and update.
//!
//! Company details are fetched on demand, keyed by the resolved identity's
//! `company_id`, and always pass through the settings normalizer in both
//! directions - no caller ever sees a raw row. Reads are cached for five
//! minutes; updates invalidate the cached entry.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;

use aduana_core::CompanyId;

use crate::backend::{BackendError, IdentityBackend, RowFilter};
use crate::models::{Company, CompanyPatch};
use crate::settings;

const COMPANIES_TABLE: &str = "companies";
const CACHE_CAPACITY: u64 = 64;
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Errors from the company read/write paths.
#[derive(Debug, Clone, Error)]
pub enum CompanyError {
    /// The remote service failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// No row exists for the requested company.
    #[error("company {0} not found")]
    NotFound(CompanyId),
}

/// Fetches and updates company records through the normalizer.
#[derive(Clone)]
pub struct CompanyService {
    backend: Arc<dyn IdentityBackend>,
    cache: Cache<CompanyId, Company>,
}

impl CompanyService {
    /// Create a company service over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Self { backend, cache }
    }

    /// Get the canonical company record, from cache when fresh.
    ///
    /// Concurrent callers for the same company coalesce onto one fetch.
    ///
    /// # Errors
    ///
    /// Returns [`CompanyError::NotFound`] if no row exists, or
    /// [`CompanyError::Backend`] if the service fails.
    pub async fn get(&self, id: &CompanyId) -> Result<Company, CompanyError> {
        self.cache
            .try_get_with(id.clone(), self.fetch(id))
            .await
            .map_err(|e: Arc<CompanyError>| e.as_ref().clone())
    }

    /// Apply a partial update and return the resulting canonical record.
    ///
    /// The write record asserts every canonical field and mirrors each into
    /// the legacy column and nested settings entry (see
    /// [`settings::prepare_write`]).
    ///
    /// # Errors
    ///
    /// Returns [`CompanyError::NotFound`] if the row vanished, or
    /// [`CompanyError::Backend`] if the service fails.
    pub async fn update(
        &self,
        id: &CompanyId,
        patch: &CompanyPatch,
    ) -> Result<Company, CompanyError> {
        let current = self.get(id).await?;
        let record = settings::prepare_write(&current, patch);

        let filters = [RowFilter::eq("id", id.as_str())];
        let rows = self.backend.update(COMPANIES_TABLE, &filters, record).await?;

        self.cache.invalidate(id).await;

        rows.first().map_or_else(
            || Err(CompanyError::NotFound(id.clone())),
            |row| Ok(settings::normalize(row)),
        )
    }

    async fn fetch(&self, id: &CompanyId) -> Result<Company, CompanyError> {
        let filters = [RowFilter::eq("id", id.as_str())];
        let rows = self.backend.select(COMPANIES_TABLE, &filters).await?;

        rows.first().map_or_else(
            || Err(CompanyError::NotFound(id.clone())),
            |row| Ok(settings::normalize(row)),
        )
    }
}
