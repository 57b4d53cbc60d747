//! The per-navigation route guard.
//!
//! A small state machine evaluated on every navigation: it asks the
//! resolver for the current identity and decides whether to render the
//! route, redirect to login, or interpose the pending-verification
//! interstitial. Transient resolution failures are retried a bounded number
//! of times per route with short spacing, and a safety timeout guarantees a
//! decision is always reached - the UI must never hang on `Checking`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep, timeout};

use crate::models::Identity;
use crate::resolver::IdentityResolver;
use crate::store::{LocalStore, StoreError, keys};

/// Resolution attempts per route before giving up and redirecting.
pub const MAX_ATTEMPTS: u32 = 3;

/// Spacing between resolution attempts within a navigation.
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Hard ceiling on how long a navigation may sit in `Checking`.
pub const SAFETY_TIMEOUT: Duration = Duration::from_secs(5);

/// Paths that never require an identity (avoids redirect loops).
pub const PUBLIC_PATHS: &[&str] = &["/login", "/register"];

/// Route guard states.
///
/// `Checking` is the in-progress state and never escapes
/// [`RouteGuard::check`]; the other four are terminal per navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteState {
    /// Resolution in progress.
    Checking,
    /// Render the route.
    Allowed,
    /// Send the visitor to the login page, destination preserved.
    RedirectLogin,
    /// Authenticated but unverified; show the interstitial.
    PendingVerification,
    /// The guard itself failed; show a recoverable error with manual retry.
    Error,
}

/// What the guard decided for a navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    /// The resolved identity, when one arrived.
    pub identity: Option<Identity>,
    /// Terminal state for this navigation.
    pub state: RouteState,
}

impl RouteDecision {
    const fn allowed(identity: Option<Identity>) -> Self {
        Self {
            identity,
            state: RouteState::Allowed,
        }
    }

    const fn terminal(state: RouteState) -> Self {
        Self {
            identity: None,
            state,
        }
    }
}

/// Retry bookkeeping for the route currently being navigated to. Reset on
/// every successful resolution and on route change.
#[derive(Debug, Default)]
struct AttemptRecord {
    path: String,
    count: u32,
}

#[derive(Debug, Default)]
struct GuardState {
    attempts: AttemptRecord,
    /// Verified-once short-circuit: the identity and path that last reached
    /// `Allowed`. Re-renders of the same path skip resolution entirely, at
    /// the cost of not seeing mid-session revocation until the next
    /// navigation or an explicit sign-out.
    allowed: Option<(Identity, String)>,
}

/// Decides, per navigation, what the rendering layer should do.
pub struct RouteGuard {
    resolver: Arc<IdentityResolver>,
    store: Arc<dyn LocalStore>,
    state: Mutex<GuardState>,
}

impl RouteGuard {
    /// Create a guard over the given resolver and local store.
    #[must_use]
    pub fn new(resolver: Arc<IdentityResolver>, store: Arc<dyn LocalStore>) -> Self {
        Self {
            resolver,
            store,
            state: Mutex::new(GuardState::default()),
        }
    }

    /// Evaluate a navigation to `path`.
    ///
    /// Always returns a terminal decision within [`SAFETY_TIMEOUT`]; never
    /// panics and never surfaces resolver failures as errors.
    pub async fn check(&self, path: &str) -> RouteDecision {
        // Login/registration are reachable unconditionally, with no
        // identity check at all.
        if Self::is_public(path) {
            return RouteDecision::allowed(None);
        }

        {
            let mut state = self.lock();
            if state.attempts.path != path {
                state.attempts = AttemptRecord {
                    path: path.to_owned(),
                    count: 0,
                };
            }
            if let Some((identity, allowed_path)) = &state.allowed
                && allowed_path == path
            {
                return RouteDecision::allowed(Some(identity.clone()));
            }
        }

        match timeout(SAFETY_TIMEOUT, self.check_inner(path)).await {
            Ok(decision) => decision,
            Err(_) => {
                tracing::warn!(path, "route check hit safety timeout, redirecting to login");
                // Best effort: preserve the destination, but the timeout
                // guarantee outranks persistence here.
                if let Err(error) = self.persist_last_route(path) {
                    tracing::warn!(%error, "could not persist last route on timeout");
                }
                RouteDecision::terminal(RouteState::RedirectLogin)
            }
        }
    }

    /// Forget all per-route bookkeeping. Called on sign-in, sign-out, and
    /// guest-mode changes so the next navigation re-verifies.
    pub fn reset(&self) {
        *self.lock() = GuardState::default();
    }

    /// Attempts consumed so far for `path`. Side-channel for diagnostics.
    #[must_use]
    pub fn attempts_for(&self, path: &str) -> u32 {
        let state = self.lock();
        if state.attempts.path == path {
            state.attempts.count
        } else {
            0
        }
    }

    /// Consume the persisted post-login destination, if one was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the local store cannot be read or written.
    pub fn take_last_route(&self) -> Result<Option<String>, StoreError> {
        let route = self.store.get(keys::LAST_VISITED_ROUTE)?;
        if route.is_some() {
            self.store.remove(keys::LAST_VISITED_ROUTE)?;
        }
        Ok(route)
    }

    async fn check_inner(&self, path: &str) -> RouteDecision {
        loop {
            match self.resolver.resolve().await {
                Some(identity) if identity.is_verified() => {
                    let mut state = self.lock();
                    state.allowed = Some((identity.clone(), path.to_owned()));
                    state.attempts = AttemptRecord {
                        path: path.to_owned(),
                        count: 0,
                    };
                    return RouteDecision::allowed(Some(identity));
                }
                Some(identity) => {
                    return RouteDecision {
                        identity: Some(identity),
                        state: RouteState::PendingVerification,
                    };
                }
                None => {
                    let attempts = {
                        let mut state = self.lock();
                        state.attempts.count += 1;
                        state.attempts.count
                    };

                    if attempts >= MAX_ATTEMPTS {
                        tracing::debug!(
                            path,
                            attempts,
                            error = ?self.resolver.last_error(),
                            "no identity after retries, redirecting to login"
                        );
                        return match self.persist_last_route(path) {
                            Ok(()) => RouteDecision::terminal(RouteState::RedirectLogin),
                            Err(error) => {
                                // Guard-internal failure: the one class that
                                // surfaces as a recoverable error screen.
                                tracing::error!(%error, "failed to persist last route");
                                RouteDecision::terminal(RouteState::Error)
                            }
                        };
                    }

                    sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    fn persist_last_route(&self, path: &str) -> Result<(), StoreError> {
        self.store.set(keys::LAST_VISITED_ROUTE, path)
    }

    fn is_public(path: &str) -> bool {
        PUBLIC_PATHS.contains(&path)
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
