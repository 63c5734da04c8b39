//! Membership request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;

use team_core::RequestContext;
use team_core::models::AccountUser;

use crate::AppState;
use crate::error::AppResult;
use crate::services::members::{self, AttachMemberRequest};
use crate::services::parse_id;

#[derive(Debug, Serialize)]
pub struct MemberList {
    pub users: Vec<AccountUser>,
}

/// `GET /accounts/{account_id}/users`
pub async fn list_members_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(account_id): Path<String>,
) -> AppResult<Json<MemberList>> {
    let account_id = parse_id(&account_id, "Account")?;
    let users = members::list_members(&state, &ctx, account_id).await?;
    Ok(Json(MemberList { users }))
}

/// `PUT /accounts/{account_id}/users/{user_id}`: requires `account-users-invite`.
pub async fn attach_member_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((account_id, user_id)): Path<(String, String)>,
    body: Result<Json<AttachMemberRequest>, JsonRejection>,
) -> AppResult<Json<AccountUser>> {
    let account_id = parse_id(&account_id, "Account")?;
    let user_id = parse_id(&user_id, "User")?;
    let Json(body) = body?;
    Ok(Json(
        members::attach_member(&state, &ctx, account_id, user_id, body.role_id).await?,
    ))
}

/// `DELETE /accounts/{account_id}/users/{user_id}`: requires `account-users-remove`.
pub async fn detach_member_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((account_id, user_id)): Path<(String, String)>,
) -> AppResult<Json<serde_json::Value>> {
    let account_id = parse_id(&account_id, "Account")?;
    let user_id = parse_id(&user_id, "User")?;
    members::detach_member(&state, &ctx, account_id, user_id).await?;
    Ok(Json(serde_json::json!({})))
}
