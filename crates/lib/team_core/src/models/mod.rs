//! Domain models.
//!
//! These are the in-memory shapes of accounts, roles, permissions and
//! memberships. Storage rows map onto them directly.

pub mod account;
pub mod account_user;
pub mod identity;
pub mod pagination;
pub mod permission;
pub mod role;

pub use account::{Account, AccountChanges};
pub use account_user::AccountUser;
pub use identity::Identity;
pub use pagination::{Pagination, SortDirection, SortField, SortParams};
pub use permission::Permission;
pub use role::{PermissionDiff, Role, RoleChanges};
