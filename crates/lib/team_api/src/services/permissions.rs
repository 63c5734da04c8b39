//! Permission catalogue.

use team_core::lookup;
use team_core::models::Permission;

use crate::AppState;
use crate::error::AppResult;

pub async fn list_permissions(state: &AppState) -> AppResult<Vec<Permission>> {
    Ok(lookup::permissions(state.store.as_ref(), &state.cache).await?)
}
