//! Application state shared across handlers.

use std::sync::Arc;

use aduana_identity::{
    CompanyService, GuestStore, IdentityResolver, JsonFileStore, LocalStore, RouteGuard,
    SupabaseClient,
};

use crate::config::DashboardConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and wires the identity core
/// together: one backend client, one resolver, one guard, one local store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: DashboardConfig,
    backend: Arc<SupabaseClient>,
    store: Arc<dyn LocalStore>,
    guests: GuestStore,
    resolver: Arc<IdentityResolver>,
    guard: Arc<RouteGuard>,
    companies: CompanyService,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: DashboardConfig) -> Self {
        let backend = Arc::new(SupabaseClient::new(&config.supabase));
        let store: Arc<dyn LocalStore> =
            Arc::new(JsonFileStore::new(config.local_store_path.clone()));
        let guests = GuestStore::new(store.clone());
        let resolver = Arc::new(IdentityResolver::new(backend.clone(), guests.clone()));
        let guard = Arc::new(RouteGuard::new(resolver.clone(), store.clone()));
        let companies = CompanyService::new(backend.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                store,
                guests,
                resolver,
                guard,
                companies,
            }),
        }
    }

    /// Get a reference to the dashboard configuration.
    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    /// Get the backend client.
    #[must_use]
    pub fn backend(&self) -> &Arc<SupabaseClient> {
        &self.inner.backend
    }

    /// Get the local key-value store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.inner.store
    }

    /// Get the guest store.
    #[must_use]
    pub fn guests(&self) -> &GuestStore {
        &self.inner.guests
    }

    /// Get the identity resolver.
    #[must_use]
    pub fn resolver(&self) -> &Arc<IdentityResolver> {
        &self.inner.resolver
    }

    /// Get the route guard.
    #[must_use]
    pub fn guard(&self) -> &Arc<RouteGuard> {
        &self.inner.guard
    }

    /// Get the company service.
    #[must_use]
    pub fn companies(&self) -> &CompanyService {
        &self.inner.companies
    }

    /// Drop all cached identity state so the next navigation re-resolves.
    ///
    /// Called after anything that changes who the visitor is: sign-in,
    /// sign-out, registration, entering or leaving guest mode.
    pub fn invalidate_identity(&self) {
        self.inner.resolver.invalidate();
        self.inner.guard.reset();
    }
}
