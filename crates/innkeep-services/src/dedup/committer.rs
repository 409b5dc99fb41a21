use std::collections::HashSet;
use std::sync::Arc;

use innkeep_core::models::MediaAsset;
use innkeep_core::AppError;
use innkeep_db::MediaStore;
use uuid::Uuid;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CommitResult {
    pub deleted_ids: Vec<Uuid>,
    pub bytes_reclaimed: i64,
}

/// Batch deletion of a group's duplicates.
#[derive(Clone)]
pub struct DeletionCommitter {
    media: Arc<dyn MediaStore>,
}

impl DeletionCommitter {
    pub fn new(media: Arc<dyn MediaStore>) -> Self {
        Self { media }
    }

    /// Delete `assets` in one batch.
    ///
    /// Refuses the whole batch if any asset is protected. Only the ids the store
    /// reports as removed by this call count towards the result; an asset that
    /// was already gone reclaims nothing here.
    #[tracing::instrument(skip(self, assets), fields(dedup.batch_size = assets.len()))]
    pub async fn commit(&self, assets: &[MediaAsset]) -> Result<CommitResult, AppError> {
        if assets.is_empty() {
            return Ok(CommitResult::default());
        }

        let protected: Vec<Uuid> = assets
            .iter()
            .filter(|a| a.is_protected)
            .map(|a| a.id)
            .collect();
        if !protected.is_empty() {
            tracing::warn!(?protected, "Deletion batch contains protected assets, refusing");
            return Err(AppError::ProtectedAsset { ids: protected });
        }

        let ids: Vec<Uuid> = assets.iter().map(|a| a.id).collect();
        let removed: HashSet<Uuid> = self.media.delete_batch(&ids).await?.into_iter().collect();

        if removed.len() < assets.len() {
            tracing::warn!(
                requested = assets.len(),
                deleted = removed.len(),
                "Store deleted fewer assets than requested"
            );
        }

        let mut result = CommitResult::default();
        for asset in assets.iter().filter(|a| removed.contains(&a.id)) {
            result.deleted_ids.push(asset.id);
            result.bytes_reclaimed += asset.byte_size;
        }
        Ok(result)
    }
}
