//! Membership service. Edges are read from the store on every check and are
//! never cached.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use team_core::RequestContext;
use team_core::lookup;
use team_core::models::AccountUser;
use team_core::models::permission::{ACCOUNT_USERS_INVITE, ACCOUNT_USERS_REMOVE};

use crate::AppState;
use crate::error::AppResult;

#[derive(Debug, Deserialize)]
pub struct AttachMemberRequest {
    pub role_id: Uuid,
}

pub async fn list_members(
    state: &AppState,
    ctx: &RequestContext,
    account_id: Uuid,
) -> AppResult<Vec<AccountUser>> {
    state
        .authorizer()
        .readable_account(&ctx.identity, account_id)
        .await?;
    Ok(state.store.list_memberships(account_id).await?)
}

/// Binds `user_id` to the account through `role_id`, replacing any role the
/// user already had there.
pub async fn attach_member(
    state: &AppState,
    ctx: &RequestContext,
    account_id: Uuid,
    user_id: Uuid,
    role_id: Uuid,
) -> AppResult<AccountUser> {
    let account = lookup::account(state.store.as_ref(), &state.cache, account_id).await?;
    state
        .authorizer()
        .require(&ctx.identity, &account, ACCOUNT_USERS_INVITE)
        .await?;

    let edge = AccountUser::invited(account_id, user_id, role_id, ctx.user_id());
    let edge = state.store.attach_user(&edge).await?;
    info!(account_id = %account_id, user_id = %user_id, role_id = %role_id, "member attached");
    Ok(edge)
}

pub async fn detach_member(
    state: &AppState,
    ctx: &RequestContext,
    account_id: Uuid,
    user_id: Uuid,
) -> AppResult<()> {
    let account = lookup::account(state.store.as_ref(), &state.cache, account_id).await?;
    state
        .authorizer()
        .require(&ctx.identity, &account, ACCOUNT_USERS_REMOVE)
        .await?;

    state.store.detach_user(account_id, user_id).await?;
    info!(account_id = %account_id, user_id = %user_id, "member detached");
    Ok(())
}
