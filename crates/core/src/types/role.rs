//! Operator roles.

use serde::{Deserialize, Serialize};

/// Role tag attached to an authenticated identity.
///
/// Roles come out of the backend `profiles` table as free-form strings;
/// anything unrecognized falls back to [`Role::Viewer`], the
/// least-privileged role. Guests are always viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access, including company settings writes.
    Admin,
    /// Day-to-day operations: shipments, declarations, settlements.
    Operator,
    /// Read-only access.
    #[default]
    Viewer,
}

impl Role {
    /// Parse a role from a backend string, falling back to `Viewer`.
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "operator" => Self::Operator,
            _ => Self::Viewer,
        }
    }

    /// Returns the role as its canonical lowercase string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Operator => "operator",
            Self::Viewer => "viewer",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
