//! Media asset repository: reads and batch deletes for the media_assets table.

use innkeep_core::models::MediaAsset;
use innkeep_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::transaction::TransactionGuard;

const ASSET_COLUMNS: &str =
    "id, url, filename, media_type, content_hash, byte_size, created_at, is_protected";

#[derive(Clone)]
pub struct MediaAssetRepository {
    pool: PgPool,
}

impl MediaAssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Every asset in the library, unfiltered, oldest first.
    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "select"))]
    pub async fn list_all(&self) -> Result<Vec<MediaAsset>, AppError> {
        let assets = sqlx::query_as::<Postgres, MediaAsset>(&format!(
            "SELECT {} FROM media_assets ORDER BY created_at ASC, id ASC",
            ASSET_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(count = assets.len(), "Loaded media assets");
        Ok(assets)
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "media_assets", db.operation = "select", db.record_id = %id)
    )]
    pub async fn get(&self, id: Uuid) -> Result<Option<MediaAsset>, AppError> {
        let asset = sqlx::query_as::<Postgres, MediaAsset>(&format!(
            "SELECT {} FROM media_assets WHERE id = $1",
            ASSET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(asset)
    }

    /// Delete `ids` in one statement, returning the ids actually removed.
    ///
    /// The whole request is refused when any of the ids is protected; the check and
    /// the delete share a transaction so a concurrent flag change cannot slip in.
    #[tracing::instrument(
        skip(self, ids),
        fields(db.table = "media_assets", db.operation = "delete", count = ids.len())
    )]
    pub async fn delete_batch(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let protected: Vec<Uuid> = sqlx::query_scalar::<Postgres, Uuid>(
            "SELECT id FROM media_assets WHERE id = ANY($1) AND is_protected FOR UPDATE",
        )
        .bind(ids)
        .fetch_all(&mut **tx)
        .await?;

        if !protected.is_empty() {
            tx.rollback().await?;
            tracing::warn!(
                protected = ?protected,
                "Refused batch delete containing protected assets"
            );
            return Err(AppError::ProtectedAsset { ids: protected });
        }

        let deleted: Vec<Uuid> = sqlx::query_scalar::<Postgres, Uuid>(
            "DELETE FROM media_assets WHERE id = ANY($1) AND NOT is_protected RETURNING id",
        )
        .bind(ids)
        .fetch_all(&mut **tx)
        .await?;

        tx.commit().await?;

        Ok(deleted)
    }
}
