//! Permission catalogue handler.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use team_core::models::Permission;

use crate::AppState;
use crate::error::AppResult;
use crate::services::permissions;

#[derive(Debug, Serialize)]
pub struct PermissionList {
    pub permissions: Vec<Permission>,
}

/// `GET /permissions`: every known permission.
pub async fn list_permissions_handler(
    State(state): State<AppState>,
) -> AppResult<Json<PermissionList>> {
    let permissions = permissions::list_permissions(&state).await?;
    Ok(Json(PermissionList { permissions }))
}
