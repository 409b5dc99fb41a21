//! Store trait abstractions for the dedup routine
//!
//! These traits define the minimal interface the dedup services need from the
//! backing store, so the routine runs unchanged against Postgres or the
//! in-memory stores.

use async_trait::async_trait;
use innkeep_core::models::{ContentRow, FieldValue, MediaAsset, UrlField};
use innkeep_core::AppError;
use uuid::Uuid;

use crate::db::{ContentRepository, MediaAssetRepository};

/// Media library operations
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Every asset, unfiltered
    async fn list_all(&self) -> Result<Vec<MediaAsset>, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<MediaAsset>, AppError>;

    /// Delete the given assets in one batch and return the ids this call removed.
    /// Fails with `AppError::ProtectedAsset`, deleting nothing, if any id is protected.
    async fn delete_batch(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError>;
}

/// Content table operations on URL-bearing fields
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Rows whose `field` holds `url`
    async fn find_referencing(
        &self,
        field: &UrlField,
        url: &str,
    ) -> Result<Vec<ContentRow>, AppError>;

    /// Every row with a value in `field`
    async fn list_field(&self, field: &UrlField) -> Result<Vec<ContentRow>, AppError>;

    /// Overwrite `field` on one row
    async fn write_field(
        &self,
        field: &UrlField,
        row_id: Uuid,
        value: &FieldValue,
    ) -> Result<(), AppError>;
}

// Implementations for concrete repository types

#[async_trait]
impl MediaStore for MediaAssetRepository {
    async fn list_all(&self) -> Result<Vec<MediaAsset>, AppError> {
        MediaAssetRepository::list_all(self).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<MediaAsset>, AppError> {
        MediaAssetRepository::get(self, id).await
    }

    async fn delete_batch(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
        MediaAssetRepository::delete_batch(self, ids).await
    }
}

#[async_trait]
impl ContentStore for ContentRepository {
    async fn find_referencing(
        &self,
        field: &UrlField,
        url: &str,
    ) -> Result<Vec<ContentRow>, AppError> {
        ContentRepository::find_referencing(self, field, url).await
    }

    async fn list_field(&self, field: &UrlField) -> Result<Vec<ContentRow>, AppError> {
        ContentRepository::list_field(self, field).await
    }

    async fn write_field(
        &self,
        field: &UrlField,
        row_id: Uuid,
        value: &FieldValue,
    ) -> Result<(), AppError> {
        ContentRepository::write_field(self, field, row_id, value).await
    }
}
