//! Reference rewriter: repoints content rows from a duplicate URL to the canonical URL.
//!
//! Writes are per field, per row, with no transaction spanning tables. Every
//! applied write is journaled with the row's previous value so a group that
//! fails part-way can be put back with [`ReferenceRewriter::compensate`].

use std::fmt;
use std::sync::Arc;

use innkeep_core::models::{FieldValue, UrlField};
use innkeep_core::AppError;
use innkeep_db::ContentStore;
use uuid::Uuid;

/// One write applied during a rewrite
#[derive(Debug, Clone)]
pub struct AppliedWrite {
    pub field: &'static UrlField,
    pub row_id: Uuid,
    pub previous: FieldValue,
    /// URL occurrences the write replaced
    pub occurrences: usize,
}

/// Writes applied for one group, in order.
#[derive(Debug, Default)]
pub struct RewriteJournal {
    writes: Vec<AppliedWrite>,
}

impl RewriteJournal {
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    fn record(&mut self, write: AppliedWrite) {
        self.writes.push(write);
    }
}

#[derive(Debug, Clone)]
pub struct RewriteFailure {
    pub field: &'static UrlField,
    /// `None` when the lookup itself failed
    pub row_id: Option<Uuid>,
    pub error: String,
}

impl fmt::Display for RewriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row_id {
            Some(row_id) => write!(f, "{} row {}: {}", self.field, row_id, self.error),
            None => write!(f, "{}: {}", self.field, self.error),
        }
    }
}

#[derive(Debug, Default)]
pub struct RewriteResult {
    /// URL occurrences replaced (a gallery holding the URL twice counts twice)
    pub references_rewritten: usize,
    pub rows_written: usize,
    pub failures: Vec<RewriteFailure>,
}

#[derive(Debug, Default)]
pub struct CompensationResult {
    pub rows_restored: usize,
    pub references_restored: usize,
    pub failures: Vec<RewriteFailure>,
}

#[derive(Clone)]
pub struct ReferenceRewriter {
    content: Arc<dyn ContentStore>,
}

impl ReferenceRewriter {
    pub fn new(content: Arc<dyn ContentStore>) -> Self {
        Self { content }
    }

    /// Replace `dup_url` with `canonical_url` in every registered field.
    ///
    /// A failed lookup or write is recorded and the walk continues with the next
    /// row or field.
    #[tracing::instrument(
        skip(self, journal),
        fields(dedup.dup_url = %dup_url, dedup.canonical_url = %canonical_url)
    )]
    pub async fn rewrite(
        &self,
        dup_url: &str,
        canonical_url: &str,
        journal: &mut RewriteJournal,
    ) -> RewriteResult {
        let mut result = RewriteResult::default();

        for field in UrlField::registry() {
            let rows = match self.content.find_referencing(field, dup_url).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        field = %field,
                        "Failed to look up referencing rows"
                    );
                    result.failures.push(RewriteFailure {
                        field,
                        row_id: None,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            for row in rows {
                let Some(replaced) = row.value.replace_url(dup_url, canonical_url) else {
                    continue;
                };
                let occurrences = row.value.references(dup_url);

                match self.content.write_field(field, row.row_id, &replaced).await {
                    Ok(()) => {
                        tracing::debug!(
                            field = %field,
                            row_id = %row.row_id,
                            occurrences,
                            "Rewrote reference"
                        );
                        journal.record(AppliedWrite {
                            field,
                            row_id: row.row_id,
                            previous: row.value,
                            occurrences,
                        });
                        result.references_rewritten += occurrences;
                        result.rows_written += 1;
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            field = %field,
                            row_id = %row.row_id,
                            "Failed to rewrite reference"
                        );
                        result.failures.push(RewriteFailure {
                            field,
                            row_id: Some(row.row_id),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        result
    }

    /// Restore every journaled row to its previous value, newest write first.
    #[tracing::instrument(skip(self, journal), fields(dedup.writes = journal.len()))]
    pub async fn compensate(&self, journal: RewriteJournal) -> CompensationResult {
        let mut result = CompensationResult::default();

        for write in journal.writes.into_iter().rev() {
            match self
                .content
                .write_field(write.field, write.row_id, &write.previous)
                .await
            {
                Ok(()) => {
                    result.rows_restored += 1;
                    result.references_restored += write.occurrences;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        field = %write.field,
                        row_id = %write.row_id,
                        "Failed to restore row; it may now point at the canonical URL"
                    );
                    result.failures.push(RewriteFailure {
                        field: write.field,
                        row_id: Some(write.row_id),
                        error: e.to_string(),
                    });
                }
            }
        }

        result
    }

    /// Count references to any of `urls` still present in content.
    pub async fn verify(&self, urls: &[&str]) -> Result<usize, AppError> {
        let mut remaining = 0;
        for field in UrlField::registry() {
            for url in urls {
                let rows = self.content.find_referencing(field, url).await?;
                remaining += rows.iter().map(|r| r.value.references(url)).sum::<usize>();
            }
        }
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use innkeep_core::models::ContentTable;
    use innkeep_db::MemoryContentStore;
    use serde_json::json;

    fn setup() -> (MemoryContentStore, ReferenceRewriter) {
        let store = MemoryContentStore::new();
        let rewriter = ReferenceRewriter::new(Arc::new(store.clone()));
        (store, rewriter)
    }

    #[tokio::test]
    async fn rewrites_all_three_shapes() {
        let (store, rewriter) = setup();
        let page = Uuid::new_v4();
        let room = Uuid::new_v4();
        let spa = Uuid::new_v4();
        store.set(
            ContentTable::Pages,
            "hero_image",
            page,
            FieldValue::Scalar(Some("/b.jpg".into())),
        );
        store.set(
            ContentTable::RoomTypes,
            "gallery",
            room,
            FieldValue::Urls(vec!["/b.jpg".into(), "/z.jpg".into(), "/b.jpg".into()]),
        );
        store.set(
            ContentTable::SpaServices,
            "media",
            spa,
            FieldValue::Items {
                url_key: "url",
                items: vec![json!({"url": "/b.jpg", "type": "image"})],
            },
        );

        let mut journal = RewriteJournal::default();
        let result = rewriter.rewrite("/b.jpg", "/a.jpg", &mut journal).await;

        assert!(result.failures.is_empty());
        assert_eq!(result.references_rewritten, 4);
        assert_eq!(result.rows_written, 3);
        assert_eq!(journal.len(), 3);
        assert_eq!(
            store.value(ContentTable::RoomTypes, "gallery", room),
            Some(FieldValue::Urls(vec!["/a.jpg".into(), "/z.jpg".into(), "/a.jpg".into()]))
        );
        assert_eq!(rewriter.verify(&["/b.jpg"]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failing_table_does_not_stop_others() {
        let (store, rewriter) = setup();
        let page = Uuid::new_v4();
        let meal = Uuid::new_v4();
        store.set(
            ContentTable::Pages,
            "hero_image",
            page,
            FieldValue::Scalar(Some("/b.jpg".into())),
        );
        store.set(
            ContentTable::Meals,
            "featured_media",
            meal,
            FieldValue::Scalar(Some("/b.jpg".into())),
        );
        store.fail_writes_on(ContentTable::Pages);

        let mut journal = RewriteJournal::default();
        let result = rewriter.rewrite("/b.jpg", "/a.jpg", &mut journal).await;

        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].row_id, Some(page));
        assert_eq!(
            store.value(ContentTable::Meals, "featured_media", meal),
            Some(FieldValue::Scalar(Some("/a.jpg".into())))
        );
        assert_eq!(rewriter.verify(&["/b.jpg"]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn compensate_restores_in_reverse_order() {
        let (store, rewriter) = setup();
        let room = Uuid::new_v4();
        let original = FieldValue::Urls(vec!["/b.jpg".into(), "/c.jpg".into()]);
        store.set(ContentTable::RoomTypes, "gallery", room, original.clone());

        let mut journal = RewriteJournal::default();
        rewriter.rewrite("/b.jpg", "/a.jpg", &mut journal).await;
        rewriter.rewrite("/c.jpg", "/a.jpg", &mut journal).await;
        assert_eq!(journal.len(), 2);

        let restored = rewriter.compensate(journal).await;
        assert_eq!(restored.rows_restored, 2);
        assert_eq!(restored.references_restored, 2);
        assert!(restored.failures.is_empty());
        assert_eq!(store.value(ContentTable::RoomTypes, "gallery", room), Some(original));
    }
}
