//! Reference index: where each media URL is used across content tables.

use std::collections::{BTreeMap, HashMap};

use innkeep_core::models::{ContentTable, MediaAsset, UrlField};
use innkeep_core::AppError;
use innkeep_db::ContentStore;
use serde::Serialize;
use uuid::Uuid;

/// One content row using a URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceLocation {
    pub table: ContentTable,
    pub column: &'static str,
    pub row_id: Uuid,
    /// How many times the row holds the URL
    pub occurrences: usize,
}

/// Snapshot of every URL referenced from a registered field.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    by_url: HashMap<String, Vec<ReferenceLocation>>,
}

impl ReferenceIndex {
    /// Scan every registered field once.
    #[tracing::instrument(skip(content))]
    pub async fn build(content: &dyn ContentStore) -> Result<Self, AppError> {
        let mut by_url: HashMap<String, Vec<ReferenceLocation>> = HashMap::new();

        for field in UrlField::registry() {
            let rows = content.list_field(field).await?;
            for row in rows {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for url in row.value.urls() {
                    *counts.entry(url).or_default() += 1;
                }
                for (url, occurrences) in counts {
                    by_url.entry(url.to_string()).or_default().push(ReferenceLocation {
                        table: field.table,
                        column: field.column,
                        row_id: row.row_id,
                        occurrences,
                    });
                }
            }
        }

        tracing::debug!(urls = by_url.len(), "Built reference index");
        Ok(Self { by_url })
    }

    pub fn locations(&self, url: &str) -> &[ReferenceLocation] {
        self.by_url.get(url).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total occurrences of `url` across all rows
    pub fn reference_count(&self, url: &str) -> usize {
        self.locations(url).iter().map(|l| l.occurrences).sum()
    }

    pub fn is_referenced(&self, url: &str) -> bool {
        self.by_url.contains_key(url)
    }

    /// Unprotected assets no content row points at.
    pub fn unreferenced<'a>(&self, assets: &'a [MediaAsset]) -> Vec<&'a MediaAsset> {
        assets
            .iter()
            .filter(|a| !a.is_protected && !self.is_referenced(&a.url))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::test_support::{asset, day};
    use innkeep_core::models::FieldValue;
    use innkeep_db::MemoryContentStore;
    use serde_json::json;

    #[tokio::test]
    async fn indexes_every_shape() {
        let store = MemoryContentStore::new();
        let page = Uuid::new_v4();
        let room = Uuid::new_v4();
        let activity = Uuid::new_v4();
        store.set(
            ContentTable::Pages,
            "hero_image",
            page,
            FieldValue::Scalar(Some("/a.jpg".into())),
        );
        store.set(
            ContentTable::RoomTypes,
            "gallery",
            room,
            FieldValue::Urls(vec!["/a.jpg".into(), "/a.jpg".into(), "/z.jpg".into()]),
        );
        store.set(
            ContentTable::Activities,
            "media",
            activity,
            FieldValue::Items {
                url_key: "url",
                items: vec![json!({"url": "/z.jpg"}), json!({"caption": "no url"})],
            },
        );

        let index = ReferenceIndex::build(&store).await.unwrap();

        assert_eq!(index.reference_count("/a.jpg"), 3);
        assert_eq!(index.locations("/a.jpg").len(), 2);
        assert_eq!(index.reference_count("/z.jpg"), 2);
        assert_eq!(index.reference_count("/missing.jpg"), 0);
        assert!(index.locations("/missing.jpg").is_empty());
    }

    #[tokio::test]
    async fn unreferenced_skips_protected() {
        let store = MemoryContentStore::new();
        store.set(
            ContentTable::Pages,
            "hero_image",
            Uuid::new_v4(),
            FieldValue::Scalar(Some("/used.jpg".into())),
        );
        let used = asset("/used.jpg", "h1", 10, day(1, 1));
        let orphan = asset("/orphan.jpg", "h2", 10, day(1, 2));
        let mut kept = asset("/kept.jpg", "h3", 10, day(1, 3));
        kept.is_protected = true;
        let assets = vec![used, orphan.clone(), kept];

        let index = ReferenceIndex::build(&store).await.unwrap();
        let unreferenced = index.unreferenced(&assets);

        assert_eq!(unreferenced.len(), 1);
        assert_eq!(unreferenced[0].id, orphan.id);
    }
}
