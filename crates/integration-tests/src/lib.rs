//! Integration test harness for the Aduana identity core.
//!
//! Provides a scripted [`MockBackend`] standing in for the hosted identity
//! service and a [`TestContext`] wiring it to a real resolver, guard, and
//! in-memory local store. Tests drive the public API exactly the way the
//! dashboard does and script the backend's failure modes.
//!
//! # Example
//!
//! ```rust,ignore
//! let ctx = TestContext::new();
//! ctx.backend.script_session(SessionScript::SignedOut);
//!
//! let decision = ctx.guard.check("/shipments").await;
//! assert_eq!(decision.state, RouteState::RedirectLogin);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use aduana_identity::{
    BackendError, GuestStore, IdentityBackend, IdentityResolver, MemoryStore, RouteGuard,
    RowFilter, Session, SessionUser,
};

/// What the mock reports when asked for the current session.
#[derive(Debug, Clone)]
pub enum SessionScript {
    /// No active session.
    SignedOut,
    /// An active session for this user.
    Active(Session),
    /// A transport-level failure.
    Transport,
    /// Never answers; the call hangs forever.
    Hang,
}

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Value>>,
    failing: Vec<String>,
}

/// A scripted stand-in for the remote identity service.
pub struct MockBackend {
    session: Mutex<SessionScript>,
    session_delay: Mutex<Duration>,
    tables: Mutex<Tables>,
    get_session_calls: AtomicU32,
    select_calls: Mutex<HashMap<String, u32>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            session: Mutex::new(SessionScript::SignedOut),
            session_delay: Mutex::new(Duration::ZERO),
            tables: Mutex::new(Tables::default()),
            get_session_calls: AtomicU32::new(0),
            select_calls: Mutex::new(HashMap::new()),
        }
    }
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session script.
    pub fn script_session(&self, script: SessionScript) {
        *lock(&self.session) = script;
    }

    /// Delay every `get_session` answer, so concurrent callers overlap.
    pub fn set_session_delay(&self, delay: Duration) {
        *lock(&self.session_delay) = delay;
    }

    /// Seed rows for a table.
    pub fn seed_table(&self, table: &str, rows: Vec<Value>) {
        lock(&self.tables).rows.insert(table.to_owned(), rows);
    }

    /// Make every read of a table fail with a transport error.
    pub fn fail_table(&self, table: &str) {
        lock(&self.tables).failing.push(table.to_owned());
    }

    /// How many times `get_session` was called.
    #[must_use]
    pub fn get_session_calls(&self) -> u32 {
        self.get_session_calls.load(Ordering::SeqCst)
    }

    /// How many times `select` was called for a table.
    #[must_use]
    pub fn select_calls(&self, table: &str) -> u32 {
        lock(&self.select_calls).get(table).copied().unwrap_or(0)
    }

    fn matching_rows(&self, table: &str, filters: &[RowFilter]) -> Result<Vec<Value>, BackendError> {
        let tables = lock(&self.tables);
        if tables.failing.iter().any(|t| t == table) {
            return Err(BackendError::Transport(format!("{table} unavailable")));
        }

        let rows = tables.rows.get(table).cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .filter(|row| filters.iter().all(|f| row_matches(row, f)))
            .collect())
    }
}

fn row_matches(row: &Value, filter: &RowFilter) -> bool {
    row.get(&filter.column)
        .and_then(Value::as_str)
        .is_some_and(|v| v == filter.value)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl IdentityBackend for MockBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);

        let script = lock(&self.session).clone();
        if matches!(script, SessionScript::Hang) {
            return std::future::pending().await;
        }

        let delay = *lock(&self.session_delay);
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }

        match script {
            SessionScript::SignedOut => Ok(None),
            SessionScript::Active(session) => Ok(Some(session)),
            SessionScript::Transport | SessionScript::Hang => {
                Err(BackendError::Transport("connection refused".to_owned()))
            }
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> Result<Session, BackendError> {
        let session = Session {
            user: SessionUser {
                id: format!("user-{email}"),
                email: email.to_owned(),
                email_verified: true,
            },
        };
        self.script_session(SessionScript::Active(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        _metadata: Value,
    ) -> Result<Session, BackendError> {
        Ok(Session {
            user: SessionUser {
                id: format!("user-{email}"),
                email: email.to_owned(),
                email_verified: false,
            },
        })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.script_session(SessionScript::SignedOut);
        Ok(())
    }

    async fn select(
        &self,
        table: &str,
        filters: &[RowFilter],
    ) -> Result<Vec<Value>, BackendError> {
        *lock(&self.select_calls).entry(table.to_owned()).or_insert(0) += 1;
        self.matching_rows(table, filters)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        let mut tables = lock(&self.tables);
        if tables.failing.iter().any(|t| t == table) {
            return Err(BackendError::Transport(format!("{table} unavailable")));
        }
        tables
            .rows
            .entry(table.to_owned())
            .or_default()
            .extend(rows.clone());
        Ok(rows)
    }

    async fn update(
        &self,
        table: &str,
        filters: &[RowFilter],
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let mut tables = lock(&self.tables);
        if tables.failing.iter().any(|t| t == table) {
            return Err(BackendError::Transport(format!("{table} unavailable")));
        }

        let Some(patch_map) = patch.as_object() else {
            return Err(BackendError::Decode("patch must be an object".to_owned()));
        };

        let mut updated = Vec::new();
        if let Some(rows) = tables.rows.get_mut(table) {
            for row in rows.iter_mut() {
                if !filters.iter().all(|f| row_matches(row, f)) {
                    continue;
                }
                if let Some(map) = row.as_object_mut() {
                    for (key, value) in patch_map {
                        map.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }
}

// =============================================================================
// TestContext
// =============================================================================

/// A fully wired identity core over the mock backend.
pub struct TestContext {
    pub backend: Arc<MockBackend>,
    pub store: Arc<MemoryStore>,
    pub guests: GuestStore,
    pub resolver: Arc<IdentityResolver>,
    pub guard: Arc<RouteGuard>,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Wire a resolver and guard to a fresh mock backend and memory store.
    #[must_use]
    pub fn new() -> Self {
        let backend = Arc::new(MockBackend::new());
        let store = Arc::new(MemoryStore::new());
        let guests = GuestStore::new(store.clone());
        let resolver = Arc::new(IdentityResolver::new(backend.clone(), guests.clone()));
        let guard = Arc::new(RouteGuard::new(resolver.clone(), store.clone()));

        Self {
            backend,
            store,
            guests,
            resolver,
            guard,
        }
    }

    /// Script an active, verified session plus a matching profile row.
    pub fn sign_in_operator(&self, user_id: &str, email: &str, company_id: Option<&str>) {
        self.backend
            .script_session(SessionScript::Active(session(user_id, email, true)));
        self.backend
            .seed_table("profiles", vec![profile_row(user_id, email, "operator", company_id)]);
    }
}

/// Build an active session for a user.
#[must_use]
pub fn session(user_id: &str, email: &str, verified: bool) -> Session {
    Session {
        user: SessionUser {
            id: user_id.to_owned(),
            email: email.to_owned(),
            email_verified: verified,
        },
    }
}

/// Build a profile row the way the backend stores them.
#[must_use]
pub fn profile_row(user_id: &str, email: &str, role: &str, company_id: Option<&str>) -> Value {
    match company_id {
        Some(company_id) => json!({
            "id": user_id,
            "email": email,
            "role": role,
            "company_id": company_id,
        }),
        None => json!({
            "id": user_id,
            "email": email,
            "role": role,
        }),
    }
}
