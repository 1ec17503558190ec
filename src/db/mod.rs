//! Database module

pub mod queries;

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, warn};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Run the embedded migrations.
///
/// The migration history is reconciled with the binary first: records of
/// migrations that no longer exist are dropped and stored checksums are
/// replaced with the embedded ones (line endings differ between checkouts).
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    if history_exists(pool).await? {
        reconcile_history(pool, &MIGRATOR).await?;
    }

    MIGRATOR.run(pool).await.context("Failed to apply migrations")?;
    Ok(())
}

async fn history_exists(pool: &PgPool) -> Result<bool> {
    let exists = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await
    .context("Failed to inspect migration history")?;

    Ok(exists)
}

async fn reconcile_history(pool: &PgPool, migrator: &Migrator) -> Result<()> {
    let embedded: Vec<_> = migrator
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .collect();
    let versions: Vec<i64> = embedded.iter().map(|m| m.version).collect();
    debug!("Embedded migration versions: {:?}", versions);

    let orphaned: Vec<i64> = sqlx::query_scalar(
        "DELETE FROM _sqlx_migrations WHERE version <> ALL($1) RETURNING version",
    )
    .bind(&versions)
    .fetch_all(pool)
    .await
    .context("Failed to remove orphaned migration records")?;
    for version in orphaned {
        warn!("Removed record of migration {} (no longer embedded)", version);
    }

    for migration in embedded {
        let checksum: &[u8] = &migration.checksum;
        let updated = sqlx::query(
            "UPDATE _sqlx_migrations SET checksum = $1 WHERE version = $2 AND checksum <> $1",
        )
        .bind(checksum)
        .bind(migration.version)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to update checksum of migration {}", migration.version))?;

        if updated.rows_affected() > 0 {
            warn!(
                "Migration {} ({}) had a different checksum, stored the embedded one",
                migration.version, migration.description
            );
        }
    }

    Ok(())
}
