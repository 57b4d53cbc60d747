//! Domain types produced by the identity core.

pub mod company;
pub mod identity;

pub use company::{Company, CompanyPatch};
pub use identity::{AuthenticatedIdentity, GuestIdentity, Identity, IdentityKind};
