//! Request middleware and extractors.

pub mod guard;

pub use guard::Guarded;
