//! Test helpers: media library and content fixtures on the in-memory stores.
//!
//! Run from workspace root: `cargo test -p innkeep-services`.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use innkeep_core::models::{ContentRow, ContentTable, FieldValue, MediaAsset, MediaType, UrlField};
use innkeep_core::AppError;
use innkeep_db::{ContentStore, MemoryContentStore, MemoryMediaStore};
use innkeep_services::{DedupOptions, MediaDedupService};
use uuid::Uuid;

/// In-memory stores plus a service wired to them.
pub struct TestLibrary {
    pub media: MemoryMediaStore,
    pub content: MemoryContentStore,
}

impl TestLibrary {
    pub fn new() -> Self {
        Self {
            media: MemoryMediaStore::new(),
            content: MemoryContentStore::new(),
        }
    }

    pub fn service(&self, options: DedupOptions) -> MediaDedupService {
        MediaDedupService::new(
            Arc::new(self.media.clone()),
            Arc::new(self.content.clone()),
            options,
        )
    }

    /// Insert an asset with a fixed id so tests can refer to it as in the scenario tables.
    pub fn add(
        &self,
        n: u128,
        url: &str,
        hash: &str,
        size: i64,
        created_at: DateTime<Utc>,
    ) -> MediaAsset {
        let asset = MediaAsset {
            id: Uuid::from_u128(n),
            url: url.to_string(),
            filename: url.trim_start_matches('/').to_string(),
            media_type: MediaType::Image,
            content_hash: Some(hash.to_string()),
            byte_size: size,
            created_at,
            is_protected: false,
        };
        self.media.insert(asset.clone());
        asset
    }

    pub fn add_protected(
        &self,
        n: u128,
        url: &str,
        hash: &str,
        size: i64,
        created_at: DateTime<Utc>,
    ) -> MediaAsset {
        let mut asset = self.add(n, url, hash, size, created_at);
        asset.is_protected = true;
        self.media.insert(asset.clone());
        asset
    }

    pub fn scalar(&self, table: ContentTable, column: &str, url: &str) -> Uuid {
        let row_id = Uuid::new_v4();
        self.content
            .set(table, column, row_id, FieldValue::Scalar(Some(url.to_string())));
        row_id
    }

    pub fn urls(&self, table: ContentTable, column: &str, urls: &[&str]) -> Uuid {
        let row_id = Uuid::new_v4();
        self.content.set(
            table,
            column,
            row_id,
            FieldValue::Urls(urls.iter().map(|u| u.to_string()).collect()),
        );
        row_id
    }

    pub fn items(&self, table: ContentTable, column: &str, items: Vec<serde_json::Value>) -> Uuid {
        let row_id = Uuid::new_v4();
        self.content.set(
            table,
            column,
            row_id,
            FieldValue::Items {
                url_key: "url",
                items,
            },
        );
        row_id
    }
}

/// Content store that acknowledges writes without applying them.
pub struct DroppedWrites(pub MemoryContentStore);

#[async_trait]
impl ContentStore for DroppedWrites {
    async fn find_referencing(
        &self,
        field: &UrlField,
        url: &str,
    ) -> Result<Vec<ContentRow>, AppError> {
        self.0.find_referencing(field, url).await
    }

    async fn list_field(&self, field: &UrlField) -> Result<Vec<ContentRow>, AppError> {
        self.0.list_field(field).await
    }

    async fn write_field(
        &self,
        _field: &UrlField,
        _row_id: Uuid,
        _value: &FieldValue,
    ) -> Result<(), AppError> {
        Ok(())
    }
}

pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

/// The three-way `h1` group: `/a.jpg` (oldest), `/b.jpg`, `/c.jpg`, 100 bytes each,
/// with a page hero on `/b.jpg` and a room gallery `[/a.jpg, /c.jpg, /z.jpg]`.
pub struct Scenario {
    pub lib: TestLibrary,
    pub page: Uuid,
    pub room: Uuid,
}

pub fn scenario() -> Scenario {
    let lib = TestLibrary::new();
    lib.add(1, "/a.jpg", "h1", 100, date(2024, 1, 1));
    lib.add(2, "/b.jpg", "h1", 100, date(2024, 2, 1));
    lib.add(3, "/c.jpg", "h1", 100, date(2024, 3, 1));
    let page = lib.scalar(ContentTable::Pages, "hero_image", "/b.jpg");
    let room = lib.urls(ContentTable::RoomTypes, "gallery", &["/a.jpg", "/c.jpg", "/z.jpg"]);
    Scenario { lib, page, room }
}
