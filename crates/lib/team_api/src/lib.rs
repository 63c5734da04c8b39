//! # team_api
//!
//! HTTP API library for Team: accounts, roles, memberships and permissions
//! behind bearer-token authentication.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::get;
use chrono::{DateTime, Utc};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use team_core::auth::{Authorizer, TokenValidator};
use team_core::cache::{AuthCache, EntityCache};
use team_core::store::AccountStore;

use crate::config::ApiConfig;
use crate::handlers::{accounts, health, members, permissions, roles};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative storage.
    pub store: Arc<dyn AccountStore>,
    /// API configuration.
    pub config: ApiConfig,
    /// Bearer-token validation, backed by the token cache.
    pub tokens: Arc<TokenValidator>,
    /// Account and role cache.
    pub cache: Arc<EntityCache>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AccountStore>,
        config: ApiConfig,
        auth_cache: Arc<AuthCache>,
        cache: Arc<EntityCache>,
    ) -> Self {
        let tokens = Arc::new(TokenValidator::new(
            &config.identity_endpoint,
            config.identity_timeout,
            auth_cache,
        ));
        Self {
            store,
            config,
            tokens,
            cache,
            started_at: Utc::now(),
        }
    }

    pub fn authorizer(&self) -> Authorizer<'_> {
        Authorizer::new(self.store.as_ref(), &self.cache)
    }
}

/// Run embedded database migrations and seed the permission catalogue.
pub async fn migrate(pool: &sqlx::PgPool) -> team_core::Result<()> {
    team_core::migrate::migrate_and_seed(pool).await
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public = Router::new().route("/health", get(health::health_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route("/permissions", get(permissions::list_permissions_handler))
        .route(
            "/accounts",
            get(accounts::list_accounts_handler).post(accounts::create_account_handler),
        )
        .route(
            "/accounts/{account_id}",
            get(accounts::get_account_handler)
                .put(accounts::update_account_handler)
                .delete(accounts::delete_account_handler),
        )
        .route(
            "/accounts/{account_id}/roles",
            get(roles::list_roles_handler).post(roles::create_role_handler),
        )
        .route(
            "/accounts/{account_id}/roles/{role_id}",
            get(roles::get_role_handler)
                .put(roles::update_role_handler)
                .delete(roles::delete_role_handler),
        )
        .route(
            "/accounts/{account_id}/users",
            get(members::list_members_handler),
        )
        .route(
            "/accounts/{account_id}/users/{user_id}",
            axum::routing::put(members::attach_member_handler)
                .delete(members::detach_member_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::request_id::assign_request_id,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}
