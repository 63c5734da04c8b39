//! Service layer: authorization, storage and cache maintenance for each
//! resource. Handlers only parse input and shape output.
//!
//! Every mutation updates or purges the affected cache keys before it
//! returns.

pub mod accounts;
pub mod members;
pub mod permissions;
pub mod roles;

use uuid::Uuid;

use crate::error::AppError;

/// Parses a path segment as a UUID, reporting `Invalid <what> ID` otherwise.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::Validation(format!("Invalid {what} ID")))
}

pub(crate) fn require_name(name: &str, what: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(format!("{what} name must not be empty")));
    }
    Ok(name.to_string())
}
