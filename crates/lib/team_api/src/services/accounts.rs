//! Account service.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use team_core::RequestContext;
use team_core::auth::Authorizer;
use team_core::cache::{CacheKey, CachedEntity};
use team_core::lookup;
use team_core::models::permission::ACCOUNT_EDIT;
use team_core::models::{Account, AccountChanges, Pagination, Role, SortParams};

use super::require_name;
use crate::AppState;
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
}

/// An account together with its roles.
#[derive(Debug, Serialize)]
pub struct AccountWithRoles {
    #[serde(flatten)]
    pub account: Account,
    pub roles: Vec<Role>,
}

/// Accounts visible to the caller: every account for super-admins, the
/// caller's own accounts otherwise.
pub async fn list_accounts(
    state: &AppState,
    ctx: &RequestContext,
    page: &mut Pagination,
    sort: &SortParams,
) -> AppResult<Vec<Account>> {
    let member = (!ctx.is_super_admin()).then(|| ctx.user_id());
    Ok(state.store.list_accounts(member, page, sort).await?)
}

/// Creates the account, its "Admin" role and the caller's membership.
pub async fn create_account(
    state: &AppState,
    ctx: &RequestContext,
    request: CreateAccountRequest,
) -> AppResult<AccountWithRoles> {
    let name = require_name(&request.name, "Account")?;
    let account = Account::new(ctx.instance_id, &name, &ctx.aud, ctx.user_id());

    let (account, admin) = state.store.create_account(&account, ctx.user_id()).await?;
    state
        .cache
        .set(CacheKey::Account(account.id), CachedEntity::Account(account.clone()));
    state
        .cache
        .set(CacheKey::Role(admin.id), CachedEntity::Role(admin.clone()));
    state.cache.delete(CacheKey::Roles(account.id));

    info!(
        account_id = %account.id,
        user_id = %ctx.user_id(),
        request_id = %ctx.request_id,
        "account created"
    );
    Ok(AccountWithRoles {
        account,
        roles: vec![admin],
    })
}

/// Fetches an account the caller may see. Outsiders get the same not-found
/// answer as for an unknown id.
pub async fn get_account(state: &AppState, ctx: &RequestContext, id: Uuid) -> AppResult<Account> {
    Ok(state
        .authorizer()
        .readable_account(&ctx.identity, id)
        .await?)
}

pub async fn update_account(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
    changes: AccountChanges,
) -> AppResult<Account> {
    changes.validate()?;

    // Changes apply to the stored row, never to a cached snapshot.
    let mut account = state.store.find_account(id).await?;
    state
        .authorizer()
        .require(&ctx.identity, &account, ACCOUNT_EDIT)
        .await?;
    if changes.touches_metadata() && !ctx.is_super_admin() {
        debug!(user_id = %ctx.user_id(), account_id = %id, "metadata change refused");
        return Err(AppError::Forbidden(
            "Only super admins may change account metadata".into(),
        ));
    }

    changes.apply(&mut account);
    let account = state.store.update_account(&account).await?;
    state
        .cache
        .refresh(CacheKey::Account(account.id), CachedEntity::Account(account.clone()));
    Ok(account)
}

/// Deletes an account. Allowed for super-admins and owners alike, through a
/// single delete path.
pub async fn delete_account(state: &AppState, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
    let account = lookup::account(state.store.as_ref(), &state.cache, id).await?;
    if !Authorizer::can_delete(&ctx.identity, &account) {
        debug!(user_id = %ctx.user_id(), account_id = %id, "delete refused");
        return Err(AppError::Forbidden(
            "Only super admins and account owners may delete an account".into(),
        ));
    }

    let role_ids = state.store.delete_account(id).await?;
    state.cache.delete_many(
        [CacheKey::Account(id), CacheKey::Roles(id)]
            .into_iter()
            .chain(role_ids.into_iter().map(CacheKey::Role)),
    );

    info!(
        account_id = %id,
        user_id = %ctx.user_id(),
        request_id = %ctx.request_id,
        "account deleted"
    );
    Ok(())
}
