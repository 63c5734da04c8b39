//! Role service.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use team_core::RequestContext;
use team_core::cache::{CacheKey, CachedEntity};
use team_core::lookup;
use team_core::models::permission::{
    ACCOUNT_ROLE_CREATE, ACCOUNT_ROLE_DESTROY, ACCOUNT_ROLE_UPDATE,
};
use team_core::models::{Role, RoleChanges};

use super::require_name;
use crate::AppState;
use crate::error::AppResult;

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

pub async fn list_roles(
    state: &AppState,
    ctx: &RequestContext,
    account_id: Uuid,
) -> AppResult<Vec<Role>> {
    state
        .authorizer()
        .readable_account(&ctx.identity, account_id)
        .await?;
    Ok(lookup::roles(state.store.as_ref(), &state.cache, account_id).await?)
}

pub async fn get_role(
    state: &AppState,
    ctx: &RequestContext,
    account_id: Uuid,
    role_id: Uuid,
) -> AppResult<Role> {
    state
        .authorizer()
        .readable_account(&ctx.identity, account_id)
        .await?;
    Ok(lookup::role(state.store.as_ref(), &state.cache, account_id, role_id).await?)
}

pub async fn create_role(
    state: &AppState,
    ctx: &RequestContext,
    account_id: Uuid,
    request: CreateRoleRequest,
) -> AppResult<Role> {
    let name = require_name(&request.name, "Role")?;
    let account = lookup::account(state.store.as_ref(), &state.cache, account_id).await?;
    state
        .authorizer()
        .require(&ctx.identity, &account, ACCOUNT_ROLE_CREATE)
        .await?;

    let role = state
        .store
        .create_role(&Role::new(account_id, &name), &request.permissions)
        .await?;
    state
        .cache
        .set(CacheKey::Role(role.id), CachedEntity::Role(role.clone()));
    state.cache.delete(CacheKey::Roles(account_id));

    info!(account_id = %account_id, role_id = %role.id, "role created");
    Ok(role)
}

/// Renames a role and/or replaces its permission set.
pub async fn update_role(
    state: &AppState,
    ctx: &RequestContext,
    account_id: Uuid,
    role_id: Uuid,
    mut changes: RoleChanges,
) -> AppResult<Role> {
    if let Some(name) = &changes.name {
        changes.name = Some(require_name(name, "Role")?);
    }
    let account = lookup::account(state.store.as_ref(), &state.cache, account_id).await?;
    state
        .authorizer()
        .require(&ctx.identity, &account, ACCOUNT_ROLE_UPDATE)
        .await?;

    let role = state.store.update_role(account_id, role_id, &changes).await?;
    state
        .cache
        .refresh(CacheKey::Role(role.id), CachedEntity::Role(role.clone()));
    state.cache.delete(CacheKey::Roles(account_id));

    info!(account_id = %account_id, role_id = %role_id, "role updated");
    Ok(role)
}

pub async fn delete_role(
    state: &AppState,
    ctx: &RequestContext,
    account_id: Uuid,
    role_id: Uuid,
) -> AppResult<()> {
    let account = lookup::account(state.store.as_ref(), &state.cache, account_id).await?;
    state
        .authorizer()
        .require(&ctx.identity, &account, ACCOUNT_ROLE_DESTROY)
        .await?;

    state.store.delete_role(account_id, role_id).await?;
    state
        .cache
        .delete_many([CacheKey::Role(role_id), CacheKey::Roles(account_id)]);

    info!(account_id = %account_id, role_id = %role_id, "role deleted");
    Ok(())
}
