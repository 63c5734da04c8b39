//! Authentication and authorization.
//!
//! - `token`: bearer extraction and remote validation backed by [`AuthCache`](crate::cache::AuthCache)
//! - `authorize`: the super-admin / owner / role permission gate

pub mod authorize;
pub mod token;

use thiserror::Error;

pub use authorize::{Access, Authorizer};
pub use token::{TokenValidator, extract_bearer_token, token_expiry};

/// Authentication errors. Both map to 401.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing or malformed authorization header")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}
