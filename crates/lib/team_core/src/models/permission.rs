//! Global permission catalogue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SPACES_CREATE: &str = "spaces-create";
pub const SPACES_EDIT: &str = "spaces-edit";
pub const SPACES_DELETE: &str = "spaces-delete";
pub const ACCOUNT_EDIT: &str = "account-edit";
pub const ACCOUNT_DESTROY: &str = "account-destroy";
pub const ACCOUNT_USERS_INVITE: &str = "account-users-invite";
pub const ACCOUNT_USERS_REMOVE: &str = "account-users-remove";
pub const ACCOUNT_ROLE_CREATE: &str = "account-role-create";
pub const ACCOUNT_ROLE_UPDATE: &str = "account-role-update";
pub const ACCOUNT_ROLE_DESTROY: &str = "account-role-destroy";

/// Permissions seeded at migration time. The default "Admin" role of every
/// new account is bound to all of them.
pub const DEFAULT_PERMISSIONS: &[&str] = &[
    SPACES_CREATE,
    SPACES_EDIT,
    SPACES_DELETE,
    "spaces-read-apikeys",
    "spaces-create-apikeys",
    "spaces-destroy-apikeys",
    "spaces-create-models",
    "spaces-edit-models",
    "spaces-destroy-models",
    "spaces-create-content",
    "spaces-edit-content",
    "spaces-destroy-content",
    "spaces-create-assets",
    "spaces-destroy-assets",
    ACCOUNT_EDIT,
    ACCOUNT_DESTROY,
    ACCOUNT_USERS_INVITE,
    ACCOUNT_USERS_REMOVE,
    ACCOUNT_ROLE_CREATE,
    ACCOUNT_ROLE_UPDATE,
    ACCOUNT_ROLE_DESTROY,
];

/// A named capability, e.g. `account-edit`. Immutable once seeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    #[serde(skip, default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(skip, default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
