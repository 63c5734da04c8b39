//! Cache-first reads of accounts, roles and permissions.
//!
//! A miss, an expired entry or an entry of the wrong type all fall through
//! to the store, and the fresh value is written back unless a newer one
//! landed in the meantime.

use tracing::debug;
use uuid::Uuid;

use crate::cache::{CacheKey, CachedEntity, EntityCache};
use crate::error::{Entity, Result, TeamError};
use crate::models::{Account, Permission, Role};
use crate::store::AccountStore;

pub async fn account(store: &dyn AccountStore, cache: &EntityCache, id: Uuid) -> Result<Account> {
    if let Some(account) = cache.account(id) {
        return Ok(account);
    }
    debug!(account_id = %id, "account cache miss");
    let account = store.find_account(id).await?;
    cache.refresh(CacheKey::Account(id), CachedEntity::Account(account.clone()));
    Ok(account)
}

/// Role `role_id` of account `account_id`. A role of another account is
/// reported as not found.
pub async fn role(
    store: &dyn AccountStore,
    cache: &EntityCache,
    account_id: Uuid,
    role_id: Uuid,
) -> Result<Role> {
    if let Some(role) = cache.role(role_id) {
        if role.account_id != account_id {
            return Err(TeamError::NotFound(Entity::Role));
        }
        return Ok(role);
    }
    debug!(role_id = %role_id, "role cache miss");
    let role = store.find_role(account_id, role_id).await?;
    cache.refresh(CacheKey::Role(role_id), CachedEntity::Role(role.clone()));
    Ok(role)
}

pub async fn roles(
    store: &dyn AccountStore,
    cache: &EntityCache,
    account_id: Uuid,
) -> Result<Vec<Role>> {
    if let Some(roles) = cache.roles(account_id) {
        return Ok(roles);
    }
    debug!(account_id = %account_id, "role list cache miss");
    let roles = store.list_roles(account_id).await?;
    cache.set(CacheKey::Roles(account_id), CachedEntity::Roles(roles.clone()));
    Ok(roles)
}

pub async fn permissions(store: &dyn AccountStore, cache: &EntityCache) -> Result<Vec<Permission>> {
    if let Some(permissions) = cache.permissions() {
        return Ok(permissions);
    }
    let permissions = store.list_permissions().await?;
    cache.set(
        CacheKey::Permissions,
        CachedEntity::Permissions(permissions.clone()),
    );
    Ok(permissions)
}
