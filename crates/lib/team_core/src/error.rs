//! Domain error type shared by storage, lookups and authorization.

use std::fmt;

use thiserror::Error;

/// Kind of entity a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Account,
    Role,
    Permission,
    Membership,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Account => "Account",
            Entity::Role => "Role",
            Entity::Permission => "Permission",
            Entity::Membership => "Membership",
        })
    }
}

/// Errors raised by the account/role domain.
#[derive(Debug, Error)]
pub enum TeamError {
    #[error("Permission denied: {0}")]
    Denied(String),

    #[error("{0} not found")]
    NotFound(Entity),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, TeamError>;
