//! Aduana identity core.
//!
//! This crate owns the answer to "who is making this request" for the
//! dashboard: it reconciles an in-process identity cache, a persisted guest
//! record, and the hosted backend's eventually-consistent session state into
//! a single authoritative [`Identity`] value, and decides per navigation
//! whether to render, redirect to login, or show a pending-verification
//! interstitial.
//!
//! # Components
//!
//! - [`backend`] - The remote identity service contract ([`IdentityBackend`])
//! - [`supabase`] - HTTP implementation of the contract (GoTrue + PostgREST)
//! - [`store`] - Local key-value persistence ([`LocalStore`]) and its keys
//! - [`guest`] - The persisted guest-mode identity record
//! - [`resolver`] - The identity resolution state machine
//! - [`guard`] - The per-navigation route guard state machine
//! - [`settings`] - Company settings normalization (legacy-column reconciliation)
//! - [`company`] - Cached company fetch/update through the normalizer
//!
//! # Control flow
//!
//! The route guard is invoked on every navigation. It asks the resolver for
//! the current identity; the resolver consults its cache, then the guest
//! store, then the remote service, coalescing concurrent callers onto one
//! in-flight remote call. The guard applies policy to the result and retries
//! transient failures with bounded backoff before redirecting to login.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod company;
pub mod config;
pub mod guard;
pub mod guest;
pub mod models;
pub mod resolver;
pub mod settings;
pub mod store;
pub mod supabase;

pub use backend::{BackendError, IdentityBackend, RowFilter, Session, SessionUser};
pub use company::{CompanyError, CompanyService};
pub use config::{ConfigError, SupabaseConfig};
pub use guard::{RouteDecision, RouteGuard, RouteState};
pub use guest::{GuestRecord, GuestStore};
pub use models::{AuthenticatedIdentity, Company, CompanyPatch, GuestIdentity, Identity, IdentityKind};
pub use resolver::{IdentityResolver, ResolveError};
pub use store::{JsonFileStore, LocalStore, MemoryStore, StoreError};
pub use supabase::SupabaseClient;
