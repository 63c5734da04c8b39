//! Health endpoint.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub start: DateTime<Utc>,
    pub uptime_secs: i64,
    pub cached_items: usize,
    pub cached_tokens: usize,
}

/// `GET /health`: liveness plus cache sizes. No authentication.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        name: "Team",
        version: env!("CARGO_PKG_VERSION"),
        description: "Team is a user and account registry for Delivc",
        start: state.started_at,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        cached_items: state.cache.len(),
        cached_tokens: state.tokens.cache().len(),
    })
}
