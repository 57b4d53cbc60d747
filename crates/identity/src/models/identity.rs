//! The resolved notion of "who is making this request".
//!
//! An [`Identity`] comes out of the resolver from exactly one source: the
//! in-process cache, the guest store, or the remote service. "Nobody" is
//! `Option<Identity>::None` at the call sites; the enum itself is a closed
//! two-way sum so the route guard can match exhaustively instead of probing
//! an `is_guest` flag next to nullable fields.

use serde::{Deserialize, Serialize};

use aduana_core::{CompanyId, Email, Role, UserId};

/// Which source of truth an identity ultimately represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    /// A local "try it out" identity, independent of the remote service.
    Guest,
    /// An account known to the remote identity service.
    Authenticated,
}

/// A guest identity synthesized from the local guest store.
///
/// Guests have no verification concept and no company; they are always
/// treated as verified viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestIdentity {
    /// Locally generated opaque id.
    pub id: UserId,
    /// Synthetic address; never routed to a mail server.
    pub email: Email,
}

/// An identity backed by an account at the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    /// The auth service's user id.
    pub id: UserId,
    /// Account email.
    pub email: Email,
    /// Verification status as reported by the remote service.
    pub verified: bool,
    /// Tenant the account belongs to, when the profile references one.
    pub company_id: Option<CompanyId>,
    /// Role tag from the profile row.
    pub role: Role,
}

/// The resolved identity of the current visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Identity {
    /// Guest mode.
    Guest(GuestIdentity),
    /// Signed-in account.
    Authenticated(AuthenticatedIdentity),
}

impl Identity {
    /// Opaque id of this identity.
    #[must_use]
    pub const fn id(&self) -> &UserId {
        match self {
            Self::Guest(guest) => &guest.id,
            Self::Authenticated(auth) => &auth.id,
        }
    }

    /// Email of this identity (synthetic for guests).
    #[must_use]
    pub const fn email(&self) -> &Email {
        match self {
            Self::Guest(guest) => &guest.email,
            Self::Authenticated(auth) => &auth.email,
        }
    }

    /// The identity's kind tag.
    #[must_use]
    pub const fn kind(&self) -> IdentityKind {
        match self {
            Self::Guest(_) => IdentityKind::Guest,
            Self::Authenticated(_) => IdentityKind::Authenticated,
        }
    }

    /// Returns `true` for guest identities.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }

    /// Verification status. Guests have no verification concept and are
    /// always considered verified.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        match self {
            Self::Guest(_) => true,
            Self::Authenticated(auth) => auth.verified,
        }
    }

    /// Company the identity belongs to, if resolved.
    #[must_use]
    pub const fn company_id(&self) -> Option<&CompanyId> {
        match self {
            Self::Guest(_) => None,
            Self::Authenticated(auth) => auth.company_id.as_ref(),
        }
    }

    /// Role tag; guests always get the least-privileged role.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Guest(_) => Role::Viewer,
            Self::Authenticated(auth) => auth.role,
        }
    }
}
