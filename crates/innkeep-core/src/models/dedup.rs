//! Duplicate groups, per-group state and the aggregate run report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::media::MediaAsset;
use crate::error::AppError;

/// Assets sharing one content hash and byte size. Always at least two members.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub hash: String,
    pub byte_size: i64,
    pub members: Vec<MediaAsset>,
}

impl DuplicateGroup {
    /// Identifier used in reports
    pub fn key(&self) -> String {
        format!("{}:{}", self.hash, self.byte_size)
    }
}

/// Result of canonical selection for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalChoice {
    pub canonical: MediaAsset,
    /// Unprotected non-canonical members, oldest first.
    pub to_delete: Vec<MediaAsset>,
    /// Protected non-canonical members; kept as-is.
    pub retained: Vec<MediaAsset>,
}

impl CanonicalChoice {
    pub fn reclaimable_bytes(&self) -> i64 {
        self.to_delete.iter().map(|a| a.byte_size).sum()
    }
}

/// Per-group progress through a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    Pending,
    Rewriting,
    RewriteFailed,
    RewriteComplete,
    Deleting,
    DeleteFailed,
    Done,
    /// Planned only (dry run)
    Skipped,
}

impl GroupState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupState::Pending => "pending",
            GroupState::Rewriting => "rewriting",
            GroupState::RewriteFailed => "rewrite_failed",
            GroupState::RewriteComplete => "rewrite_complete",
            GroupState::Deleting => "deleting",
            GroupState::DeleteFailed => "delete_failed",
            GroupState::Done => "done",
            GroupState::Skipped => "skipped",
        }
    }

    /// Move to `next`, rejecting transitions the merge never makes.
    pub fn advance(self, next: GroupState) -> Result<GroupState, AppError> {
        use GroupState::*;
        let allowed = matches!(
            (self, next),
            (Pending, Rewriting)
                | (Pending, Skipped)
                | (Rewriting, RewriteFailed)
                | (Rewriting, RewriteComplete)
                | (RewriteComplete, Deleting)
                | (RewriteComplete, Done)
                | (Deleting, DeleteFailed)
                | (Deleting, Done)
        );
        if allowed {
            Ok(next)
        } else {
            Err(AppError::InvalidStateTransition {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GroupState::RewriteFailed
                | GroupState::DeleteFailed
                | GroupState::Done
                | GroupState::Skipped
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, GroupState::RewriteFailed | GroupState::DeleteFailed)
    }
}

/// Outcome of processing one duplicate group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupOutcome {
    pub group: String,
    pub canonical_id: Uuid,
    pub canonical_url: String,
    /// Assets actually removed from the media store.
    pub deleted_ids: Vec<Uuid>,
    /// Assets slated for removal (planned or attempted).
    pub planned_ids: Vec<Uuid>,
    pub retained_ids: Vec<Uuid>,
    pub references_rewritten: usize,
    pub references_restored: usize,
    /// Bytes held by the assets slated for removal.
    pub bytes_reclaimable: i64,
    /// Bytes held by the assets actually removed.
    pub bytes_reclaimed: i64,
    pub state: GroupState,
    pub errors: Vec<String>,
}

impl GroupOutcome {
    pub fn new(group: String, choice: &CanonicalChoice) -> Self {
        Self {
            group,
            canonical_id: choice.canonical.id,
            canonical_url: choice.canonical.url.clone(),
            deleted_ids: Vec::new(),
            planned_ids: choice.to_delete.iter().map(|a| a.id).collect(),
            retained_ids: choice.retained.iter().map(|a| a.id).collect(),
            references_rewritten: 0,
            references_restored: 0,
            bytes_reclaimable: choice.reclaimable_bytes(),
            bytes_reclaimed: 0,
            state: GroupState::Pending,
            errors: Vec::new(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.state.is_failure()
    }
}

/// Summary of a full dedup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupReport {
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub groups_processed: usize,
    pub duplicates_planned: usize,
    pub duplicates_removed: usize,
    pub bytes_reclaimable: i64,
    pub bytes_reclaimed: i64,
    pub references_rewritten: usize,
    pub failed_groups: Vec<String>,
    pub outcomes: Vec<GroupOutcome>,
}

impl DedupReport {
    pub fn has_failures(&self) -> bool {
        !self.failed_groups.is_empty()
    }

    /// One-line operator notification
    pub fn summary_line(&self) -> String {
        if self.dry_run {
            return format!(
                "{} duplicate groups found, would remove {} duplicates ({} bytes)",
                self.groups_processed, self.duplicates_planned, self.bytes_reclaimable
            );
        }
        format!(
            "{} duplicate groups processed, removed {} duplicates ({} bytes), \
             {} references rewritten, {} groups failed",
            self.groups_processed,
            self.duplicates_removed,
            self.bytes_reclaimed,
            self.references_rewritten,
            self.failed_groups.len()
        )
    }
}
