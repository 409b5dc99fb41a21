//! Postgres repositories
//!
//! `media_asset` owns the media library table; `content` reads and rewrites the
//! URL-bearing columns of the site's content tables.

pub mod content;
pub mod media_asset;
pub mod transaction;

pub use content::ContentRepository;
pub use media_asset::MediaAssetRepository;

use anyhow::{Context, Result};
use innkeep_core::DedupConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::time::Duration;

/// Open a connection pool. Does not touch the schema; see [`migrate`].
pub async fn connect(config: &DedupConfig) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );
    Ok(pool)
}

/// Apply pending migrations from the workspace `migrations/` directory.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    fn migration_sql() -> String {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "sql"))
            .collect();
        files.sort();
        files
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn migrations_tolerate_existing_schema() {
        let sql = migration_sql();
        for line in sql.lines().map(str::trim) {
            if line.starts_with("CREATE TABLE") || line.starts_with("CREATE INDEX") {
                assert!(line.contains("IF NOT EXISTS"), "unguarded: {line}");
            }
        }
        let type_at = sql.find("CREATE TYPE media_type").unwrap();
        let guard = &sql[type_at..];
        assert!(sql[..type_at].trim_end().ends_with("DO $$ BEGIN"));
        assert!(guard.contains("WHEN duplicate_object THEN NULL"));
    }
}
