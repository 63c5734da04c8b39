//! Authentication middleware: bearer extraction, token validation and
//! request context construction.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use team_core::RequestContext;
use team_core::auth::extract_bearer_token;

use super::request_id::RequestId;
use crate::AppState;
use crate::error::AppError;

/// Header selecting the tenant audience.
pub const AUD_HEADER: &str = "x-jwt-aud";

/// Axum middleware: validates `Authorization: Bearer <token>` against the
/// identity service and injects a [`RequestContext`] into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = extract_bearer_token(header)?.to_string();

    let identity = state.tokens.validate(&token).await?;

    let aud = request
        .headers()
        .get(AUD_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(state.config.default_aud.as_str())
        .to_string();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let ctx = RequestContext::new(identity, aud).with_request_id(request_id);
    request.extensions_mut().insert(ctx);

    Ok(next.run(request).await)
}
