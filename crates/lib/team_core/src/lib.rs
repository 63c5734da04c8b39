//! # team_core
//!
//! Core domain logic for Team: bearer-token validation, the token and entity
//! caches, permission resolution, and account/role storage.

pub mod auth;
pub mod cache;
pub mod context;
pub mod error;
pub mod lookup;
pub mod migrate;
pub mod models;
pub mod store;
pub mod validation;

pub use context::RequestContext;
pub use error::{Entity, Result, TeamError};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
