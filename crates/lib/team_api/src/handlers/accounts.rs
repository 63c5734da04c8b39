//! Account request handlers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use team_core::RequestContext;
use team_core::models::{Account, AccountChanges, Pagination, SortDirection, SortField, SortParams};
use team_core::store::ACCOUNT_SORT_FIELDS;

use crate::AppState;
use crate::error::AppResult;
use crate::services::accounts::{self, AccountWithRoles, CreateAccountRequest};
use crate::services::parse_id;

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

const NEWEST_FIRST: SortField = SortField {
    name: "created_at",
    dir: SortDirection::Desc,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccountList {
    pub accounts: Vec<Account>,
    pub aud: String,
}

/// `GET /accounts`: accounts visible to the caller, paginated.
pub async fn list_accounts_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<(HeaderMap, Json<AccountList>)> {
    let Query(params) = params?;
    let mut page = Pagination::new(params.page, params.per_page)?;
    let sort = SortParams::parse(params.sort.as_deref(), ACCOUNT_SORT_FIELDS, NEWEST_FIRST)?;

    let list = accounts::list_accounts(&state, &ctx, &mut page, &sort).await?;

    let mut headers = HeaderMap::new();
    headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from(page.count));
    Ok((
        headers,
        Json(AccountList {
            accounts: list,
            aud: ctx.aud,
        }),
    ))
}

/// `POST /accounts`: create an account owned by the caller.
pub async fn create_account_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> AppResult<Json<AccountWithRoles>> {
    let Json(body) = body?;
    Ok(Json(accounts::create_account(&state, &ctx, body).await?))
}

/// `GET /accounts/{account_id}`: the account named by the path.
pub async fn get_account_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(account_id): Path<String>,
) -> AppResult<Json<Account>> {
    let id = parse_id(&account_id, "Account")?;
    Ok(Json(accounts::get_account(&state, &ctx, id).await?))
}

/// `PUT /accounts/{account_id}`: update name, billing fields or metadata.
pub async fn update_account_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(account_id): Path<String>,
    body: Result<Json<AccountChanges>, JsonRejection>,
) -> AppResult<Json<Account>> {
    let id = parse_id(&account_id, "Account")?;
    let Json(changes) = body?;
    Ok(Json(accounts::update_account(&state, &ctx, id, changes).await?))
}

/// `DELETE /accounts/{account_id}`
pub async fn delete_account_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(account_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let id = parse_id(&account_id, "Account")?;
    accounts::delete_account(&state, &ctx, id).await?;
    Ok(Json(serde_json::json!({})))
}
