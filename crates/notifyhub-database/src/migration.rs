//! Schema for notifications and their actor links.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

use notifyhub_core::error::{AppError, ErrorKind};

/// Migrations embedded from the workspace `migrations/` directory.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Bring the notification tables up to date. Safe to call on every start.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    let latest = MIGRATOR.iter().map(|m| m.version).max().unwrap_or_default();
    info!(migrations = MIGRATOR.iter().count(), latest, "Applying notification schema");

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Notification schema migration failed: {e}"),
            e,
        )
    })?;

    info!(latest, "Notification schema is current");
    Ok(())
}
