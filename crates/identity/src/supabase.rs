//! HTTP implementation of the identity backend.
//!
//! Talks to a Supabase project: GoTrue for auth (`/auth/v1/...`) and
//! PostgREST for row access (`/rest/v1/{table}`). The client holds the
//! current token pair; an expired access token is refreshed with the
//! refresh grant before the session is revalidated.
//!
//! # Example
//!
//! ```rust,ignore
//! use aduana_identity::{SupabaseClient, SupabaseConfig};
//!
//! let client = SupabaseClient::new(&SupabaseConfig::from_env()?);
//! let session = client.sign_in_with_password("ops@despacho.example", "secret").await?;
//! let rows = client.select("profiles", &[RowFilter::eq("id", &session.user.id)]).await?;
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::backend::{BackendError, IdentityBackend, RowFilter, Session, SessionUser};
use crate::config::SupabaseConfig;

/// Seconds of slack before nominal expiry at which a token counts as
/// expired, absorbing clock skew and request latency.
const EXPIRY_MARGIN_SECS: i64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<String>,
    #[serde(default)]
    confirmed_at: Option<String>,
}

impl AuthUser {
    fn into_session_user(self) -> SessionUser {
        SessionUser {
            id: self.id,
            email: self.email.unwrap_or_default(),
            email_verified: self.email_confirmed_at.is_some() || self.confirmed_at.is_some(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: AuthUser,
}

/// Sign-up responses carry the user, and tokens only when the project does
/// not require email confirmation first.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<AuthUser>,
    // When tokens are absent the user may be the top-level object itself.
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredSession {
    access_token: String,
    refresh_token: Option<String>,
    /// Unix seconds at which the access token expires, when known.
    expires_at: Option<i64>,
    user: SessionUser,
}

impl StoredSession {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| chrono::Utc::now().timestamp() >= at - EXPIRY_MARGIN_SECS)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for the hosted identity service.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: Mutex<Option<StoredSession>>,
}

impl SupabaseClient {
    /// Create a client from configuration.
    #[must_use]
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http: reqwest::Client::new(),
                base_url: config.project_url.clone(),
                anon_key: config.anon_key_value(),
                session: Mutex::new(None),
            }),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.inner.base_url)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.inner.base_url)
    }

    fn stored_session(&self) -> Option<StoredSession> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_session(&self, session: Option<StoredSession>) {
        *self
            .inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = session;
    }

    /// Bearer token for data requests: the user's access token when signed
    /// in, the anon key otherwise.
    fn bearer(&self) -> String {
        self.stored_session()
            .map_or_else(|| self.inner.anon_key.clone(), |s| s.access_token)
    }

    fn stamp(response: TokenResponse) -> StoredSession {
        let expires_at = response
            .expires_in
            .map(|secs| chrono::Utc::now().timestamp() + secs);
        StoredSession {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at,
            user: response.user.into_session_user(),
        }
    }

    /// Exchange the refresh token for a fresh access token.
    async fn refresh(&self, refresh_token: &str) -> Result<StoredSession, BackendError> {
        let response = self
            .inner
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.inner.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(transport)?;

        let response = check_status(response).await?;
        let token: TokenResponse = response.json().await.map_err(decode)?;
        let stored = Self::stamp(token);
        self.store_session(Some(stored.clone()));
        Ok(stored)
    }

    /// Revalidate a stored session against the auth service.
    async fn fetch_user(&self, access_token: &str) -> Result<Option<SessionUser>, BackendError> {
        let response = self
            .inner
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        if matches!(response.status().as_u16(), 401 | 403) {
            return Ok(None);
        }

        let response = check_status(response).await?;
        let user: AuthUser = response.json().await.map_err(decode)?;
        Ok(Some(user.into_session_user()))
    }
}

#[async_trait]
impl IdentityBackend for SupabaseClient {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(mut stored) = self.stored_session() else {
            return Ok(None);
        };

        if stored.is_expired() {
            match stored.refresh_token.clone() {
                Some(refresh_token) => match self.refresh(&refresh_token).await {
                    Ok(fresh) => stored = fresh,
                    // A revoked refresh token means the session is over.
                    Err(BackendError::Unauthorized) => {
                        self.store_session(None);
                        return Ok(None);
                    }
                    Err(other) => return Err(other),
                },
                None => {
                    self.store_session(None);
                    return Ok(None);
                }
            }
        }

        // The remote session state is eventually consistent with ours;
        // revalidate rather than trusting the local copy.
        match self.fetch_user(&stored.access_token).await? {
            Some(user) => {
                let session = Session { user: user.clone() };
                self.store_session(Some(StoredSession { user, ..stored }));
                Ok(Some(session))
            }
            None => {
                self.store_session(None);
                Ok(None)
            }
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let response = self
            .inner
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.inner.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport)?;

        let response = check_status(response).await?;
        let token: TokenResponse = response.json().await.map_err(decode)?;

        let stored = Self::stamp(token);
        let session = Session {
            user: stored.user.clone(),
        };
        self.store_session(Some(stored));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Value,
    ) -> Result<Session, BackendError> {
        let response = self
            .inner
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.inner.anon_key)
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await
            .map_err(transport)?;

        let response = check_status(response).await?;
        let signup: SignUpResponse = response.json().await.map_err(decode)?;

        let user = match (signup.user, signup.id) {
            (Some(user), _) => user,
            (None, Some(id)) => AuthUser {
                id,
                email: signup.email,
                email_confirmed_at: signup.email_confirmed_at,
                confirmed_at: None,
            },
            (None, None) => {
                return Err(BackendError::Decode(
                    "sign-up response carried no user".to_owned(),
                ));
            }
        };
        let user = user.into_session_user();

        if let Some(access_token) = signup.access_token {
            let expires_at = signup
                .expires_in
                .map(|secs| chrono::Utc::now().timestamp() + secs);
            self.store_session(Some(StoredSession {
                access_token,
                refresh_token: signup.refresh_token,
                expires_at,
                user: user.clone(),
            }));
        }

        Ok(Session { user })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let Some(stored) = self.stored_session() else {
            return Ok(());
        };

        // The local session is gone regardless of what the service says.
        self.store_session(None);

        let response = self
            .inner
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(&stored.access_token)
            .send()
            .await
            .map_err(transport)?;

        // An already-dead token is a successful sign-out.
        if matches!(response.status().as_u16(), 401 | 403) {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    async fn select(
        &self,
        table: &str,
        filters: &[RowFilter],
    ) -> Result<Vec<Value>, BackendError> {
        let mut query: Vec<(String, String)> = vec![("select".to_owned(), "*".to_owned())];
        query.extend(
            filters
                .iter()
                .map(|f| (f.column.clone(), format!("eq.{}", f.value))),
        );

        let response = self
            .inner
            .http
            .get(self.rest_url(table))
            .query(&query)
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(transport)?;

        let response = check_status(response).await?;
        response.json().await.map_err(decode)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        let response = self
            .inner
            .http
            .post(self.rest_url(table))
            .header("apikey", &self.inner.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer())
            .json(&rows)
            .send()
            .await
            .map_err(transport)?;

        let response = check_status(response).await?;
        response.json().await.map_err(decode)
    }

    async fn update(
        &self,
        table: &str,
        filters: &[RowFilter],
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let query: Vec<(String, String)> = filters
            .iter()
            .map(|f| (f.column.clone(), format!("eq.{}", f.value)))
            .collect();

        let response = self
            .inner
            .http
            .patch(self.rest_url(table))
            .query(&query)
            .header("apikey", &self.inner.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer())
            .json(&patch)
            .send()
            .await
            .map_err(transport)?;

        let response = check_status(response).await?;
        response.json().await.map_err(decode)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error Mapping
// ─────────────────────────────────────────────────────────────────────────────

fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

fn decode(e: reqwest::Error) -> BackendError {
    BackendError::Decode(e.to_string())
}

/// Map non-success statuses into the backend error taxonomy.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if matches!(status.as_u16(), 401 | 403) {
        return Err(BackendError::Unauthorized);
    }

    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    })
}
