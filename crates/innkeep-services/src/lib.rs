//! Innkeep Services Layer
//!
//! This crate hosts the media deduplication routine: hash indexing, canonical
//! selection, reference rewriting across content tables, batch deletion and
//! the aggregate report. It depends on the store seam from `innkeep-db` only,
//! so the same orchestration runs against Postgres or the in-memory stores.

pub mod dedup;

pub use dedup::{
    build_hash_index, select_canonical, DedupOptions, DedupPlan, DeletionCommitter,
    MediaDedupService, PlannedGroup, ReferenceIndex, ReferenceLocation, ReferenceRewriter,
    ReportBuilder, RewriteJournal,
};
