//! The identity resolution state machine.
//!
//! `resolve()` produces one authoritative answer to "who is here" by
//! consulting, in order, the in-process cache, the guest store, and the
//! remote service. It never returns an error: every failure below it
//! degrades to "no identity", with the last failure retained on a side
//! channel for the route guard to inspect.
//!
//! Concurrency: all state lives in one injected struct behind a mutex that
//! is only ever taken for synchronous sections, never across an `await`.
//! The in-flight flag coalesces simultaneous callers onto a single remote
//! round-trip; late callers poll briefly and read whatever the cache holds
//! when the in-flight call settles.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};

use aduana_core::{CompanyId, Email, Role, UserId};

use crate::backend::{BackendError, IdentityBackend, RowFilter, Session};
use crate::guest::GuestStore;
use crate::models::{AuthenticatedIdentity, Identity};

/// How long a resolved identity is served without re-consulting any source.
pub const CACHE_TTL: Duration = Duration::from_secs(10);

/// How long a caller waits on another caller's in-flight resolution.
pub const IN_FLIGHT_WAIT: Duration = Duration::from_secs(2);

/// Poll interval while waiting on an in-flight resolution.
pub const IN_FLIGHT_POLL: Duration = Duration::from_millis(100);

const PROFILES_TABLE: &str = "profiles";
const COMPANIES_TABLE: &str = "companies";

/// Why the last resolution cycle failed to produce an identity.
///
/// These are expected operating conditions, not exceptions; the resolver
/// records the most recent one and otherwise degrades to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The remote service could not be reached or answered abnormally.
    #[error("identity service unavailable: {0}")]
    Remote(String),

    /// A session exists but its profile row could not be read. Resolution
    /// fails closed rather than returning a partial identity.
    #[error("profile unavailable for user {0}")]
    Profile(String),

    /// The local store failed while checking for a guest record.
    #[error("local store failure: {0}")]
    Store(String),
}

/// A settled resolution, stamped with when it settled.
#[derive(Debug, Clone)]
struct CacheEntry {
    identity: Option<Identity>,
    resolved_at: Instant,
}

/// All mutable resolver state, constructor-injected so independent
/// resolvers can coexist (and be tested) without ambient globals.
#[derive(Debug, Default)]
struct ResolverState {
    cache: Option<CacheEntry>,
    in_flight: bool,
    last_error: Option<ResolveError>,
}

/// What the fast-path lock decided for this caller.
enum Claim {
    /// Cache is fresh; answer without I/O.
    Fresh(Option<Identity>),
    /// Someone else is resolving; wait for their result.
    Wait,
    /// This caller owns the resolution cycle.
    Owned,
}

/// Outcome of one full resolution cycle against the sources.
enum Outcome {
    /// A definitive identity; cached.
    Resolved(Identity),
    /// Definitively signed out; cached as `None` so repeat navigations
    /// within the TTL stay quiet.
    SignedOut,
    /// A transient failure; NOT cached, so the guard's bounded retries
    /// reach the sources again.
    Failed(ResolveError),
}

/// Resolves the current visitor to an [`Identity`].
pub struct IdentityResolver {
    backend: std::sync::Arc<dyn IdentityBackend>,
    guests: GuestStore,
    state: Mutex<ResolverState>,
}

impl IdentityResolver {
    /// Create a resolver over the given backend and guest store.
    #[must_use]
    pub fn new(backend: std::sync::Arc<dyn IdentityBackend>, guests: GuestStore) -> Self {
        Self {
            backend,
            guests,
            state: Mutex::new(ResolverState::default()),
        }
    }

    /// Resolve the current identity.
    ///
    /// Never fails: unrecoverable conditions return `None` with the cause
    /// available via [`last_error`](Self::last_error).
    pub async fn resolve(&self) -> Option<Identity> {
        let claim = {
            let mut state = self.lock();
            if let Some(entry) = &state.cache
                && entry.resolved_at.elapsed() < CACHE_TTL
            {
                tracing::debug!("identity served from cache");
                Claim::Fresh(entry.identity.clone())
            } else if state.in_flight {
                Claim::Wait
            } else {
                state.in_flight = true;
                Claim::Owned
            }
        };

        match claim {
            Claim::Fresh(identity) => identity,
            Claim::Wait => self.wait_for_in_flight().await,
            Claim::Owned => {
                // Clears the in-flight flag however this cycle ends,
                // including cancellation when a caller's timeout drops us
                // mid-await.
                let _reset = InFlightReset { state: &self.state };

                let outcome = self.resolve_uncached().await;
                let mut state = self.lock();
                match outcome {
                    Outcome::Resolved(identity) => {
                        state.cache = Some(CacheEntry {
                            identity: Some(identity.clone()),
                            resolved_at: Instant::now(),
                        });
                        state.last_error = None;
                        Some(identity)
                    }
                    Outcome::SignedOut => {
                        state.cache = Some(CacheEntry {
                            identity: None,
                            resolved_at: Instant::now(),
                        });
                        state.last_error = None;
                        None
                    }
                    Outcome::Failed(error) => {
                        tracing::debug!(%error, "resolution degraded to no identity");
                        state.last_error = Some(error);
                        None
                    }
                }
            }
        }
    }

    /// Drop the cached identity so the next `resolve()` consults the
    /// sources again. Called on sign-in, sign-out, and guest-mode changes.
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.cache = None;
        state.last_error = None;
    }

    /// The failure recorded by the most recent resolution cycle, if that
    /// cycle produced no identity.
    #[must_use]
    pub fn last_error(&self) -> Option<ResolveError> {
        self.lock().last_error.clone()
    }

    /// Poll until the in-flight resolution settles (or the wait budget is
    /// spent), then return whatever the cache holds - possibly `None` if
    /// the in-flight call failed, possibly a slightly stale value if it was
    /// itself serving from cache.
    async fn wait_for_in_flight(&self) -> Option<Identity> {
        let deadline = Instant::now() + IN_FLIGHT_WAIT;
        loop {
            sleep(IN_FLIGHT_POLL).await;
            let state = self.lock();
            if !state.in_flight || Instant::now() >= deadline {
                return state.cache.as_ref().and_then(|entry| entry.identity.clone());
            }
        }
    }

    /// One full pass over the sources: guest store first, then the remote
    /// session and its profile row.
    async fn resolve_uncached(&self) -> Outcome {
        // Guest precedence: a valid local guest record wins outright and
        // the remote service is never consulted.
        match self.guests.load() {
            Ok(Some(guest)) => return Outcome::Resolved(Identity::Guest(guest)),
            Ok(None) => {}
            Err(error) => {
                // Can't prove there is no guest record, so don't answer
                // with a remote identity that a guest record would shadow.
                tracing::warn!(%error, "guest store unreadable");
                return Outcome::Failed(ResolveError::Store(error.to_string()));
            }
        }

        let session = match self.backend.get_session().await {
            Ok(Some(session)) => session,
            Ok(None) => return Outcome::SignedOut,
            Err(BackendError::Unauthorized) => return Outcome::SignedOut,
            Err(error) => return Outcome::Failed(ResolveError::Remote(error.to_string())),
        };

        self.resolve_profile(session).await
    }

    /// Fetch the profile row for an active session and assemble the
    /// identity. Fails closed: no partial identity is ever returned.
    async fn resolve_profile(&self, session: Session) -> Outcome {
        let user_id = session.user.id.clone();
        let filters = [RowFilter::eq("id", user_id.clone())];

        let rows = match self.backend.select(PROFILES_TABLE, &filters).await {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!(%error, %user_id, "profile fetch failed, failing closed");
                return Outcome::Failed(ResolveError::Profile(user_id));
            }
        };

        let Some(profile) = rows.first() else {
            tracing::warn!(%user_id, "session has no profile row, failing closed");
            return Outcome::Failed(ResolveError::Profile(user_id));
        };

        let raw_email = profile
            .get("email")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(&session.user.email);
        let Ok(email) = Email::parse(raw_email) else {
            return Outcome::Failed(ResolveError::Profile(user_id));
        };

        let role = profile
            .get("role")
            .and_then(|v| v.as_str())
            .map(Role::parse_or_default)
            .unwrap_or_default();

        let company_id = profile
            .get("company_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(CompanyId::new);

        // Warm the company row; failure here is non-fatal. Details stay
        // lazy - callers go through the company service when they need them.
        if let Some(company_id) = &company_id {
            let filters = [RowFilter::eq("id", company_id.as_str())];
            if let Err(error) = self.backend.select(COMPANIES_TABLE, &filters).await {
                tracing::debug!(%error, company_id = %company_id, "company prefetch failed");
            }
        }

        Outcome::Resolved(Identity::Authenticated(AuthenticatedIdentity {
            id: UserId::new(user_id),
            email,
            verified: session.user.email_verified,
            company_id,
            role,
        }))
    }

    fn lock(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight flag when the owning resolution cycle ends, even if
/// the cycle's future is dropped before completing.
struct InFlightReset<'a> {
    state: &'a Mutex<ResolverState>,
}

impl Drop for InFlightReset<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight = false;
    }
}
