//! The persisted guest-mode identity.
//!
//! A visitor can use the dashboard without an account; the resulting
//! identity lives entirely in the local store under
//! [`keys::GUEST_USER`](crate::store::keys::GUEST_USER) and is independent
//! of the remote service. Guest records are created and destroyed only by
//! explicit user action, never by cache expiry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use aduana_core::{Email, UserId};

use crate::models::GuestIdentity;
use crate::store::{LocalStore, StoreError, keys};

/// Domain used for synthesized guest email addresses.
const GUEST_EMAIL_DOMAIN: &str = "invitado.local";

/// The on-disk guest record.
///
/// A record is valid only if it deserializes, carries a non-empty `id` and
/// a well-formed `email`, and is explicitly marked `isGuest`. Anything else
/// is corruption and is deleted on sight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestRecord {
    /// Locally generated id.
    pub id: String,
    /// Synthetic email.
    pub email: String,
    /// Explicit guest marker; must be `true`.
    #[serde(rename = "isGuest")]
    pub is_guest: bool,
}

/// Reads, creates, and destroys the persisted guest record.
#[derive(Clone)]
pub struct GuestStore {
    store: Arc<dyn LocalStore>,
}

impl GuestStore {
    /// Create a guest store over the given local store.
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Load the guest identity, if a valid record exists.
    ///
    /// Malformed records (bad JSON, missing fields, missing guest marker,
    /// unparseable email) are deleted and reported as absent, so corruption
    /// self-heals instead of wedging resolution.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only for storage I/O failures, never for
    /// record corruption.
    pub fn load(&self) -> Result<Option<GuestIdentity>, StoreError> {
        let Some(raw) = self.store.get(keys::GUEST_USER)? else {
            return Ok(None);
        };

        match Self::validate(&raw) {
            Some(identity) => Ok(Some(identity)),
            None => {
                tracing::warn!("deleting malformed guest record");
                self.store.remove(keys::GUEST_USER)?;
                Ok(None)
            }
        }
    }

    /// Create and persist a fresh guest identity, replacing any previous
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record cannot be persisted.
    pub fn create(&self) -> Result<GuestIdentity, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let short: String = id.chars().take(8).collect();
        let record = GuestRecord {
            email: format!("guest-{short}@{GUEST_EMAIL_DOMAIN}"),
            id,
            is_guest: true,
        };

        let json =
            serde_json::to_string(&record).map_err(|e| StoreError::Io(e.to_string()))?;
        self.store.set(keys::GUEST_USER, &json)?;

        // The record was just built from valid parts; re-validate anyway so
        // a future shape change cannot persist something load() would reject.
        Self::validate(&json).ok_or_else(|| {
            StoreError::Io("freshly created guest record failed validation".to_owned())
        })
    }

    /// Destroy the guest record. Explicit user action only.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing storage cannot be written.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(keys::GUEST_USER)
    }

    /// Parse and validate a raw record, returning the synthesized identity.
    fn validate(raw: &str) -> Option<GuestIdentity> {
        let record: GuestRecord = serde_json::from_str(raw).ok()?;
        if !record.is_guest || record.id.is_empty() {
            return None;
        }
        let email = Email::parse(&record.email).ok()?;
        Some(GuestIdentity {
            id: UserId::new(record.id),
            email,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn guest_store() -> (GuestStore, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (GuestStore::new(store.clone()), store)
    }

    #[test]
    fn test_load_absent() {
        let (guests, _) = guest_store();
        assert_eq!(guests.load().unwrap(), None);
    }

    #[test]
    fn test_create_then_load() {
        let (guests, _) = guest_store();
        let created = guests.create().unwrap();
        let loaded = guests.load().unwrap().unwrap();

        assert_eq!(created, loaded);
        assert!(loaded.email.as_str().starts_with("guest-"));
        assert_eq!(loaded.email.domain(), GUEST_EMAIL_DOMAIN);
    }

    #[test]
    fn test_clear_destroys_record() {
        let (guests, store) = guest_store();
        guests.create().unwrap();
        guests.clear().unwrap();

        assert_eq!(store.get(keys::GUEST_USER).unwrap(), None);
        assert_eq!(guests.load().unwrap(), None);
    }

    #[test]
    fn test_invalid_json_self_heals() {
        let (guests, store) = guest_store();
        store.set(keys::GUEST_USER, "{not json").unwrap();

        assert_eq!(guests.load().unwrap(), None);
        assert_eq!(store.get(keys::GUEST_USER).unwrap(), None);
    }

    #[test]
    fn test_missing_marker_self_heals() {
        let (guests, store) = guest_store();
        store
            .set(
                keys::GUEST_USER,
                r#"{"id":"g-1","email":"guest-g1@invitado.local","isGuest":false}"#,
            )
            .unwrap();

        assert_eq!(guests.load().unwrap(), None);
        assert_eq!(store.get(keys::GUEST_USER).unwrap(), None);
    }

    #[test]
    fn test_empty_id_self_heals() {
        let (guests, store) = guest_store();
        store
            .set(
                keys::GUEST_USER,
                r#"{"id":"","email":"guest@invitado.local","isGuest":true}"#,
            )
            .unwrap();

        assert_eq!(guests.load().unwrap(), None);
        assert_eq!(store.get(keys::GUEST_USER).unwrap(), None);
    }

    #[test]
    fn test_malformed_email_self_heals() {
        let (guests, store) = guest_store();
        store
            .set(
                keys::GUEST_USER,
                r#"{"id":"g-1","email":"not-an-email","isGuest":true}"#,
            )
            .unwrap();

        assert_eq!(guests.load().unwrap(), None);
        assert_eq!(store.get(keys::GUEST_USER).unwrap(), None);
    }
}
