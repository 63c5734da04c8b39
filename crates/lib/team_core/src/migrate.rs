//! Schema migrations and the permission seed.
//!
//! SQL files live in `team_core/migrations/` and are embedded at compile time.

use sqlx::PgPool;
use tracing::info;

use crate::models::permission::DEFAULT_PERMISSIONS;
use crate::store::{AccountStore, PgStore};

/// Run all embedded database migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Migrates, then inserts any missing default permissions.
pub async fn migrate_and_seed(pool: &PgPool) -> crate::Result<()> {
    migrate(pool)
        .await
        .map_err(|e| crate::TeamError::DbError(e.into()))?;
    PgStore::new(pool.clone())
        .seed_permissions(DEFAULT_PERMISSIONS)
        .await?;
    info!(count = DEFAULT_PERMISSIONS.len(), "permissions seeded");
    Ok(())
}
