//! In-process store for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccountStore, unique_names};
use crate::error::{Entity, Result, TeamError};
use crate::models::permission::DEFAULT_PERMISSIONS;
use crate::models::role::ADMIN_ROLE;
use crate::models::{
    Account, AccountUser, Pagination, Permission, Role, RoleChanges, SortDirection, SortParams,
};

#[derive(Debug, Default)]
struct Tables {
    permissions: Vec<Permission>,
    accounts: HashMap<Uuid, Account>,
    roles: HashMap<Uuid, Role>,
    memberships: Vec<AccountUser>,
}

impl Tables {
    fn seed(&mut self, names: &[&str]) {
        for name in names {
            if !self.permissions.iter().any(|p| p.name == *name) {
                self.permissions.push(Permission::new(*name));
            }
        }
        self.permissions.sort_by(|a, b| a.name.cmp(&b.name));
    }

    fn resolve(&self, names: &[String]) -> Result<Vec<Permission>> {
        let mut out = Vec::new();
        for name in unique_names(names) {
            let permission = self
                .permissions
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| TeamError::Validation(format!("unknown permission '{name}'")))?;
            out.push(permission.clone());
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn role_mut(&mut self, account_id: Uuid, role_id: Uuid) -> Result<&mut Role> {
        self.roles
            .get_mut(&role_id)
            .filter(|r| r.account_id == account_id)
            .ok_or(TeamError::NotFound(Entity::Role))
    }
}

/// Timestamp for a commit replacing a row last written at `previous`.
/// Strictly later than `previous`, at the microsecond precision Postgres keeps.
fn commit_time(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous + Duration::microseconds(1))
}

/// [`AccountStore`] kept entirely in memory. Each write holds the table lock
/// for its whole duration.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Empty store with the default permissions already seeded.
    pub fn new() -> Self {
        let mut tables = Tables::default();
        tables.seed(DEFAULT_PERMISSIONS);
        Self {
            tables: RwLock::new(tables),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn seed_permissions(&self, names: &[&str]) -> Result<()> {
        self.tables.write().await.seed(names);
        Ok(())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        Ok(self.tables.read().await.permissions.clone())
    }

    async fn find_account(&self, id: Uuid) -> Result<Account> {
        self.tables
            .read()
            .await
            .accounts
            .get(&id)
            .cloned()
            .ok_or(TeamError::NotFound(Entity::Account))
    }

    async fn list_accounts(
        &self,
        member: Option<Uuid>,
        page: &mut Pagination,
        sort: &SortParams,
    ) -> Result<Vec<Account>> {
        let tables = self.tables.read().await;
        let mut accounts: Vec<Account> = tables
            .accounts
            .values()
            .filter(|a| match member {
                None => true,
                Some(user_id) => {
                    a.is_owner(user_id)
                        || tables
                            .memberships
                            .iter()
                            .any(|m| m.account_id == a.id && m.user_id == user_id)
                }
            })
            .cloned()
            .collect();

        // Only `created_at` is sortable.
        let dir = sort
            .fields
            .first()
            .map(|f| f.dir)
            .unwrap_or(SortDirection::Desc);
        accounts.sort_by(|a, b| {
            let ord = a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id));
            match dir {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });

        page.count = accounts.len() as u64;
        Ok(accounts
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.per_page as usize)
            .collect())
    }

    async fn create_account(&self, account: &Account, creator: Uuid) -> Result<(Account, Role)> {
        let mut tables = self.tables.write().await;
        let mut role = Role::new(account.id, ADMIN_ROLE);
        role.permissions = tables.permissions.clone();

        tables.accounts.insert(account.id, account.clone());
        tables.roles.insert(role.id, role.clone());
        tables
            .memberships
            .push(AccountUser::creator(account.id, creator, role.id));
        Ok((account.clone(), role))
    }

    async fn update_account(&self, account: &Account) -> Result<Account> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .accounts
            .get_mut(&account.id)
            .ok_or(TeamError::NotFound(Entity::Account))?;
        let updated_at = commit_time(stored.updated_at);
        *stored = account.clone();
        stored.updated_at = updated_at;
        Ok(stored.clone())
    }

    async fn delete_account(&self, id: Uuid) -> Result<Vec<Uuid>> {
        let mut tables = self.tables.write().await;
        if tables.accounts.remove(&id).is_none() {
            return Err(TeamError::NotFound(Entity::Account));
        }
        let role_ids: Vec<Uuid> = tables
            .roles
            .values()
            .filter(|r| r.account_id == id)
            .map(|r| r.id)
            .collect();
        for role_id in &role_ids {
            tables.roles.remove(role_id);
        }
        tables.memberships.retain(|m| m.account_id != id);
        Ok(role_ids)
    }

    async fn find_role(&self, account_id: Uuid, role_id: Uuid) -> Result<Role> {
        self.tables
            .read()
            .await
            .roles
            .get(&role_id)
            .filter(|r| r.account_id == account_id)
            .cloned()
            .ok_or(TeamError::NotFound(Entity::Role))
    }

    async fn list_roles(&self, account_id: Uuid) -> Result<Vec<Role>> {
        let tables = self.tables.read().await;
        let mut roles: Vec<Role> = tables
            .roles
            .values()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(roles)
    }

    async fn create_role(&self, role: &Role, permissions: &[String]) -> Result<Role> {
        let mut tables = self.tables.write().await;
        if !tables.accounts.contains_key(&role.account_id) {
            return Err(TeamError::NotFound(Entity::Account));
        }
        let mut role = role.clone();
        role.permissions = tables.resolve(permissions)?;
        tables.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update_role(
        &self,
        account_id: Uuid,
        role_id: Uuid,
        changes: &RoleChanges,
    ) -> Result<Role> {
        let mut tables = self.tables.write().await;
        let desired = match &changes.permissions {
            Some(names) => Some(tables.resolve(names)?),
            None => None,
        };
        let role = tables.role_mut(account_id, role_id)?;
        if let Some(name) = &changes.name {
            role.name = name.trim().to_string();
        }
        if let Some(desired) = desired {
            role.permissions = desired;
        }
        role.updated_at = commit_time(role.updated_at);
        Ok(role.clone())
    }

    async fn delete_role(&self, account_id: Uuid, role_id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.role_mut(account_id, role_id)?;
        tables.roles.remove(&role_id);
        tables.memberships.retain(|m| m.role_id != role_id);
        Ok(())
    }

    async fn find_membership(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccountUser>> {
        Ok(self
            .tables
            .read()
            .await
            .memberships
            .iter()
            .find(|m| m.account_id == account_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_memberships(&self, account_id: Uuid) -> Result<Vec<AccountUser>> {
        Ok(self
            .tables
            .read()
            .await
            .memberships
            .iter()
            .filter(|m| m.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn attach_user(&self, edge: &AccountUser) -> Result<AccountUser> {
        let mut tables = self.tables.write().await;
        if !tables.accounts.contains_key(&edge.account_id) {
            return Err(TeamError::NotFound(Entity::Account));
        }
        tables.role_mut(edge.account_id, edge.role_id)?;

        let existing = tables
            .memberships
            .iter_mut()
            .find(|m| m.account_id == edge.account_id && m.user_id == edge.user_id);
        match existing {
            Some(current) => {
                current.role_id = edge.role_id;
                current.invited_at = edge.invited_at;
                current.invited_by = edge.invited_by;
                Ok(current.clone())
            }
            None => {
                tables.memberships.push(edge.clone());
                Ok(edge.clone())
            }
        }
    }

    async fn detach_user(&self, account_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        let before = tables.memberships.len();
        tables
            .memberships
            .retain(|m| !(m.account_id == account_id && m.user_id == user_id));
        if tables.memberships.len() == before {
            return Err(TeamError::NotFound(Entity::Membership));
        }
        Ok(())
    }
}
