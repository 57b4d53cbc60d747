//! Remote identity service contract.
//!
//! The hosted backend exposes session retrieval, credentialed sign-in/up/out,
//! and generic row access to the `profiles` and `companies` relations. The
//! rest of the crate treats every one of these calls as fallible and slow;
//! nothing above this trait assumes synchronous or guaranteed delivery.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors returned by the remote identity service.
///
/// `Unauthorized` is definitive (the session is gone; equivalent to "no
/// identity"); every other variant is a transient degradation that callers
/// may retry.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The session token was rejected (expired or revoked).
    #[error("session is missing or no longer valid")]
    Unauthorized,

    /// The service answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for logging.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Returns `true` for failures that may succeed on retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::Unauthorized)
    }
}

/// The user attached to an active remote session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Opaque user id assigned by the auth service.
    pub id: String,
    /// The email the account was registered with.
    pub email: String,
    /// Whether the service reports the email as confirmed.
    pub email_verified: bool,
}

/// An active session as reported by the remote identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The signed-in user.
    pub user: SessionUser,
}

/// An equality filter on a single column, the only filter shape the row
/// access paths need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    /// Column name.
    pub column: String,
    /// Value the column must equal.
    pub value: String,
}

impl RowFilter {
    /// Filter rows where `column` equals `value`.
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Contract for the hosted auth/database service.
///
/// Implemented over HTTP by [`SupabaseClient`](crate::supabase::SupabaseClient)
/// and by scripted mocks in tests. Rows are duck-typed [`Value`]s on purpose:
/// the underlying store holds the same fact under multiple legacy names, and
/// reconciling that is the settings normalizer's job, not the transport's.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Retrieve the current session, if any.
    ///
    /// Returns `Ok(None)` when the service reports no active session.
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    /// Sign in with email and password, establishing a session.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    /// Register a new account, establishing a session where the service
    /// allows it.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Value,
    ) -> Result<Session, BackendError>;

    /// Terminate the current session.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Read rows from `table` matching all `filters`.
    async fn select(&self, table: &str, filters: &[RowFilter])
    -> Result<Vec<Value>, BackendError>;

    /// Insert rows into `table`, returning the stored representation.
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError>;

    /// Patch rows in `table` matching all `filters`, returning the updated
    /// representation.
    async fn update(
        &self,
        table: &str,
        filters: &[RowFilter],
        patch: Value,
    ) -> Result<Vec<Value>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_is_not_transient() {
        assert!(!BackendError::Unauthorized.is_transient());
        assert!(BackendError::Transport("connection refused".into()).is_transient());
        assert!(
            BackendError::Status {
                status: 503,
                body: "unavailable".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_row_filter_eq() {
        let filter = RowFilter::eq("id", "u-1");
        assert_eq!(filter.column, "id");
        assert_eq!(filter.value, "u-1");
    }
}
