//! Role request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;

use team_core::RequestContext;
use team_core::models::{Role, RoleChanges};

use crate::AppState;
use crate::error::AppResult;
use crate::services::parse_id;
use crate::services::roles::{self, CreateRoleRequest};

#[derive(Debug, Serialize)]
pub struct RoleList {
    pub roles: Vec<Role>,
}

/// `GET /accounts/{account_id}/roles`
pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(account_id): Path<String>,
) -> AppResult<Json<RoleList>> {
    let account_id = parse_id(&account_id, "Account")?;
    let roles = roles::list_roles(&state, &ctx, account_id).await?;
    Ok(Json(RoleList { roles }))
}

/// `GET /accounts/{account_id}/roles/{role_id}`
pub async fn get_role_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((account_id, role_id)): Path<(String, String)>,
) -> AppResult<Json<Role>> {
    let account_id = parse_id(&account_id, "Account")?;
    let role_id = parse_id(&role_id, "Role")?;
    Ok(Json(roles::get_role(&state, &ctx, account_id, role_id).await?))
}

/// `POST /accounts/{account_id}/roles`: requires `account-role-create`.
pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(account_id): Path<String>,
    body: Result<Json<CreateRoleRequest>, JsonRejection>,
) -> AppResult<Json<Role>> {
    let account_id = parse_id(&account_id, "Account")?;
    let Json(body) = body?;
    Ok(Json(roles::create_role(&state, &ctx, account_id, body).await?))
}

/// `PUT /accounts/{account_id}/roles/{role_id}`: requires `account-role-update`.
/// A `permissions` list replaces the role's whole permission set.
pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((account_id, role_id)): Path<(String, String)>,
    body: Result<Json<RoleChanges>, JsonRejection>,
) -> AppResult<Json<Role>> {
    let account_id = parse_id(&account_id, "Account")?;
    let role_id = parse_id(&role_id, "Role")?;
    let Json(changes) = body?;
    Ok(Json(
        roles::update_role(&state, &ctx, account_id, role_id, changes).await?,
    ))
}

/// `DELETE /accounts/{account_id}/roles/{role_id}`: requires `account-role-destroy`.
pub async fn delete_role_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((account_id, role_id)): Path<(String, String)>,
) -> AppResult<Json<serde_json::Value>> {
    let account_id = parse_id(&account_id, "Account")?;
    let role_id = parse_id(&role_id, "Role")?;
    roles::delete_role(&state, &ctx, account_id, role_id).await?;
    Ok(Json(serde_json::json!({})))
}
