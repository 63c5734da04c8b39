//! Application error types.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use team_core::TeamError;
use team_core::auth::AuthError;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".into()),
            _ => {
                error!(error = %e, "database error");
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Unauthorized(e.to_string())
    }
}

impl From<TeamError> for AppError {
    fn from(e: TeamError) -> Self {
        match e {
            TeamError::Denied(permission) => AppError::Forbidden(format!(
                "You don't have the `{permission}` permission for this account"
            )),
            e @ TeamError::NotFound(_) => AppError::NotFound(e.to_string()),
            TeamError::Validation(msg) => AppError::Validation(msg),
            TeamError::DbError(e) => AppError::from(e),
            TeamError::Encoding(e) => {
                error!(error = %e, "encoding error");
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Validation(format!("Could not read params: {}", e.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::Validation(format!("Bad query parameters: {}", e.body_text()))
    }
}
