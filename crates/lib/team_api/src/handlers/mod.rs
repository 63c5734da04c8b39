//! Request handlers.

pub mod accounts;
pub mod health;
pub mod members;
pub mod permissions;
pub mod roles;
