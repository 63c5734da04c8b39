//! Persistence of accounts, roles, permissions and memberships.
//!
//! [`AccountStore`] is the authoritative source behind the entity cache.
//! Every multi-step write is atomic: it either fully applies or leaves no
//! trace.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Account, AccountUser, Pagination, Permission, Role, RoleChanges, SortParams,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Columns accounts may be sorted by.
pub const ACCOUNT_SORT_FIELDS: &[&str] = &["created_at"];

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Inserts any of `names` not yet present. Idempotent.
    async fn seed_permissions(&self, names: &[&str]) -> Result<()>;

    async fn list_permissions(&self) -> Result<Vec<Permission>>;

    /// Fails with `NotFound(Account)` when absent.
    async fn find_account(&self, id: Uuid) -> Result<Account>;

    /// Lists accounts, restricted to those `member` belongs to when given.
    /// Sets `page.count` to the total number of matches.
    async fn list_accounts(
        &self,
        member: Option<Uuid>,
        page: &mut Pagination,
        sort: &SortParams,
    ) -> Result<Vec<Account>>;

    /// Persists `account` together with an "Admin" role holding every known
    /// permission and a confirmed membership binding `creator` to that role.
    async fn create_account(&self, account: &Account, creator: Uuid) -> Result<(Account, Role)>;

    /// Writes the editable columns of `account`.
    async fn update_account(&self, account: &Account) -> Result<Account>;

    /// Deletes the account with its roles, grants and memberships. Returns
    /// the ids of the removed roles.
    async fn delete_account(&self, id: Uuid) -> Result<Vec<Uuid>>;

    /// Fails with `NotFound(Role)` when absent or owned by another account.
    async fn find_role(&self, account_id: Uuid, role_id: Uuid) -> Result<Role>;

    async fn list_roles(&self, account_id: Uuid) -> Result<Vec<Role>>;

    /// Persists `role` bound to exactly the named permissions.
    async fn create_role(&self, role: &Role, permissions: &[String]) -> Result<Role>;

    /// Renames the role and/or replaces its permission set. The stored set
    /// afterwards is exactly `changes.permissions`.
    async fn update_role(
        &self,
        account_id: Uuid,
        role_id: Uuid,
        changes: &RoleChanges,
    ) -> Result<Role>;

    /// Deletes the role, its grants and the memberships bound through it.
    async fn delete_role(&self, account_id: Uuid, role_id: Uuid) -> Result<()>;

    async fn find_membership(&self, account_id: Uuid, user_id: Uuid)
    -> Result<Option<AccountUser>>;

    async fn list_memberships(&self, account_id: Uuid) -> Result<Vec<AccountUser>>;

    /// Creates the user's edge or replaces its role; never a second edge.
    async fn attach_user(&self, edge: &AccountUser) -> Result<AccountUser>;

    /// Fails with `NotFound(Membership)` when the user has no edge.
    async fn detach_user(&self, account_id: Uuid, user_id: Uuid) -> Result<()>;
}

/// Deduplicates requested permission names, keeping first occurrence order.
pub(crate) fn unique_names(names: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}
