//! Media deduplication
//!
//! Control flow per run: hash index → canonical selection (per group) →
//! reference rewrite (per group, per field) → deletion (per group) → report.
//! Groups and fields are processed strictly one at a time.

pub mod committer;
pub mod index;
pub mod references;
pub mod report;
pub mod rewriter;
pub mod selector;
pub mod service;

pub use committer::{CommitResult, DeletionCommitter};
pub use index::build_hash_index;
pub use references::{ReferenceIndex, ReferenceLocation};
pub use report::ReportBuilder;
pub use rewriter::{
    CompensationResult, ReferenceRewriter, RewriteFailure, RewriteJournal, RewriteResult,
};
pub use selector::select_canonical;
pub use service::{DedupOptions, DedupPlan, MediaDedupService, PlannedGroup};
