//! In-memory store implementations
//!
//! These stores let the dedup routine run without a database: unit and
//! integration tests use them, with failure injection to exercise the
//! partial-rewrite and failed-delete paths.

use async_trait::async_trait;
use innkeep_core::models::{ContentRow, ContentTable, FieldValue, MediaAsset, UrlField};
use innkeep_core::AppError;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::store_traits::{ContentStore, MediaStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct MediaState {
    assets: BTreeMap<Uuid, MediaAsset>,
    fail_deletes: bool,
    delete_calls: usize,
}

/// In-memory media library
#[derive(Clone, Default)]
pub struct MemoryMediaStore {
    state: Arc<Mutex<MediaState>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, asset: MediaAsset) {
        lock(&self.state).assets.insert(asset.id, asset);
    }

    /// Snapshot of the remaining assets
    pub fn assets(&self) -> Vec<MediaAsset> {
        lock(&self.state).assets.values().cloned().collect()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        lock(&self.state).assets.contains_key(&id)
    }

    /// Make every following `delete_batch` fail with a database-style error.
    pub fn fail_deletes(&self, fail: bool) {
        lock(&self.state).fail_deletes = fail;
    }

    /// Number of `delete_batch` calls that reached the store
    pub fn delete_calls(&self) -> usize {
        lock(&self.state).delete_calls
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn list_all(&self) -> Result<Vec<MediaAsset>, AppError> {
        let mut assets = self.assets();
        assets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(assets)
    }

    async fn get(&self, id: Uuid) -> Result<Option<MediaAsset>, AppError> {
        Ok(lock(&self.state).assets.get(&id).cloned())
    }

    async fn delete_batch(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
        let mut state = lock(&self.state);
        state.delete_calls += 1;
        if state.fail_deletes {
            return Err(AppError::Internal("injected delete failure".to_string()));
        }

        let protected: Vec<Uuid> = ids
            .iter()
            .filter(|id| state.assets.get(*id).is_some_and(|a| a.is_protected))
            .copied()
            .collect();
        if !protected.is_empty() {
            return Err(AppError::ProtectedAsset { ids: protected });
        }

        Ok(ids
            .iter()
            .filter(|id| state.assets.remove(*id).is_some())
            .copied()
            .collect())
    }
}

#[derive(Default)]
struct ContentState {
    fields: HashMap<(ContentTable, &'static str), BTreeMap<Uuid, FieldValue>>,
    failing_tables: HashSet<ContentTable>,
    writes: usize,
}

/// In-memory content tables
#[derive(Clone, Default)]
pub struct MemoryContentStore {
    state: Arc<Mutex<ContentState>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `table.column` on `row_id`. Panics if the column is not a registered URL field.
    pub fn set(&self, table: ContentTable, column: &str, row_id: Uuid, value: FieldValue) {
        let field = UrlField::find(table, column)
            .unwrap_or_else(|| panic!("{}.{} is not a registered URL field", table, column));
        lock(&self.state)
            .fields
            .entry((field.table, field.column))
            .or_default()
            .insert(row_id, value);
    }

    pub fn value(&self, table: ContentTable, column: &str, row_id: Uuid) -> Option<FieldValue> {
        let state = lock(&self.state);
        state
            .fields
            .iter()
            .find(|((t, c), _)| *t == table && *c == column)
            .and_then(|(_, rows)| rows.get(&row_id).cloned())
    }

    /// Make writes to `table` fail until cleared.
    pub fn fail_writes_on(&self, table: ContentTable) {
        lock(&self.state).failing_tables.insert(table);
    }

    /// Number of successful writes so far
    pub fn writes(&self) -> usize {
        lock(&self.state).writes
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn find_referencing(
        &self,
        field: &UrlField,
        url: &str,
    ) -> Result<Vec<ContentRow>, AppError> {
        let state = lock(&self.state);
        Ok(state
            .fields
            .get(&(field.table, field.column))
            .map(|rows| {
                rows.iter()
                    .filter(|(_, value)| value.references(url) > 0)
                    .map(|(row_id, value)| ContentRow {
                        row_id: *row_id,
                        value: value.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_field(&self, field: &UrlField) -> Result<Vec<ContentRow>, AppError> {
        let state = lock(&self.state);
        Ok(state
            .fields
            .get(&(field.table, field.column))
            .map(|rows| {
                rows.iter()
                    .map(|(row_id, value)| ContentRow {
                        row_id: *row_id,
                        value: value.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn write_field(
        &self,
        field: &UrlField,
        row_id: Uuid,
        value: &FieldValue,
    ) -> Result<(), AppError> {
        let mut state = lock(&self.state);
        if state.failing_tables.contains(&field.table) {
            return Err(AppError::Internal(format!(
                "injected write failure on {}",
                field.table
            )));
        }
        let slot = state
            .fields
            .get_mut(&(field.table, field.column))
            .and_then(|rows| rows.get_mut(&row_id))
            .ok_or_else(|| AppError::NotFound(format!("{} row {}", field.table, row_id)))?;
        *slot = value.clone();
        state.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use innkeep_core::models::MediaType;

    fn asset(protected: bool) -> MediaAsset {
        MediaAsset {
            id: Uuid::new_v4(),
            url: format!("/{}.jpg", Uuid::new_v4()),
            filename: "x.jpg".to_string(),
            media_type: MediaType::Image,
            content_hash: Some("h1".to_string()),
            byte_size: 10,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            is_protected: protected,
        }
    }

    #[tokio::test]
    async fn delete_batch_refuses_protected_and_deletes_nothing() {
        let store = MemoryMediaStore::new();
        let free = asset(false);
        let locked = asset(true);
        store.insert(free.clone());
        store.insert(locked.clone());

        let err = store.delete_batch(&[free.id, locked.id]).await.unwrap_err();
        match err {
            AppError::ProtectedAsset { ids } => assert_eq!(ids, vec![locked.id]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.contains(free.id));
        assert!(store.contains(locked.id));
    }

    #[tokio::test]
    async fn delete_batch_returns_only_removed_ids() {
        let store = MemoryMediaStore::new();
        let present = asset(false);
        let missing = asset(false);
        store.insert(present.clone());

        let deleted = store.delete_batch(&[present.id, missing.id]).await.unwrap();
        assert_eq!(deleted, vec![present.id]);
        assert!(!store.contains(present.id));
    }

    #[tokio::test]
    async fn write_field_requires_existing_row() {
        let store = MemoryContentStore::new();
        let field = UrlField::find(ContentTable::Pages, "hero_image").unwrap();
        let err = store
            .write_field(field, Uuid::new_v4(), &FieldValue::Scalar(None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_referencing_matches_array_elements() {
        let store = MemoryContentStore::new();
        let room = Uuid::new_v4();
        store.set(
            ContentTable::RoomTypes,
            "gallery",
            room,
            FieldValue::Urls(vec!["/a.jpg".to_string(), "/c.jpg".to_string()]),
        );
        let field = UrlField::find(ContentTable::RoomTypes, "gallery").unwrap();
        let rows = store.find_referencing(field, "/c.jpg").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_id, room);
        assert!(store.find_referencing(field, "/q.jpg").await.unwrap().is_empty());
    }
}
