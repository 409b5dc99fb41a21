use std::collections::HashSet;
use std::sync::Arc;

use innkeep_core::models::{
    CanonicalChoice, DedupReport, DuplicateGroup, GroupOutcome, GroupState, MediaAsset, UrlField,
};
use innkeep_core::{AppError, DedupConfig};
use innkeep_db::{ContentStore, MediaStore};
use serde::Serialize;
use uuid::Uuid;

use super::committer::DeletionCommitter;
use super::index::build_hash_index;
use super::references::{ReferenceIndex, ReferenceLocation};
use super::report::ReportBuilder;
use super::rewriter::{ReferenceRewriter, RewriteJournal};
use super::selector::select_canonical;

/// Run-time switches for a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupOptions {
    /// Plan only; no content writes and no deletions.
    pub dry_run: bool,
    /// Restore journaled rows when a group's rewrite fails part-way.
    pub compensate_on_failure: bool,
    /// Re-query content for the duplicate URLs before deleting.
    pub verify_before_delete: bool,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            compensate_on_failure: true,
            verify_before_delete: true,
        }
    }
}

impl From<&DedupConfig> for DedupOptions {
    fn from(config: &DedupConfig) -> Self {
        Self {
            dry_run: config.dry_run,
            compensate_on_failure: config.compensate_on_failure,
            verify_before_delete: config.verify_before_delete,
        }
    }
}

/// What a merge would do to one group.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedGroup {
    pub group: String,
    pub canonical: MediaAsset,
    pub to_delete: Vec<MediaAsset>,
    pub retained: Vec<MediaAsset>,
    /// References to the duplicate URLs that would be rewritten
    pub references: usize,
    pub bytes_reclaimable: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupPlan {
    pub assets_scanned: usize,
    pub groups: Vec<PlannedGroup>,
    pub duplicates: usize,
    pub references: usize,
    pub bytes_reclaimable: i64,
}

/// Media deduplication service
///
/// Merges duplicate uploads: one canonical asset per duplicate group survives,
/// every content reference to the others is repointed at it, then the others
/// are deleted. Groups run one at a time and a failed group never stops the run.
#[derive(Clone)]
pub struct MediaDedupService {
    media: Arc<dyn MediaStore>,
    content: Arc<dyn ContentStore>,
    rewriter: ReferenceRewriter,
    committer: DeletionCommitter,
    options: DedupOptions,
}

impl MediaDedupService {
    pub fn new(
        media: Arc<dyn MediaStore>,
        content: Arc<dyn ContentStore>,
        options: DedupOptions,
    ) -> Self {
        Self {
            rewriter: ReferenceRewriter::new(content.clone()),
            committer: DeletionCommitter::new(media.clone()),
            media,
            content,
            options,
        }
    }

    pub fn options(&self) -> DedupOptions {
        self.options
    }

    async fn duplicate_groups(
        &self,
    ) -> Result<(usize, Vec<(DuplicateGroup, CanonicalChoice)>), AppError> {
        // Unfiltered on purpose: duplicates may span media types.
        let assets = self.media.list_all().await?;
        let groups = build_hash_index(&assets)
            .into_iter()
            .filter_map(|group| select_canonical(&group).map(|choice| (group, choice)))
            .collect();
        Ok((assets.len(), groups))
    }

    /// Compute groups, canonical choices and reference counts without writing.
    #[tracing::instrument(skip(self))]
    pub async fn plan(&self) -> Result<DedupPlan, AppError> {
        let (assets_scanned, groups) = self.duplicate_groups().await?;
        let index = ReferenceIndex::build(self.content.as_ref()).await?;

        let mut plan = DedupPlan {
            assets_scanned,
            groups: Vec::with_capacity(groups.len()),
            duplicates: 0,
            references: 0,
            bytes_reclaimable: 0,
        };

        for (group, choice) in groups {
            let references = doomed_urls(&choice)
                .iter()
                .map(|url| index.reference_count(url))
                .sum();
            let planned = PlannedGroup {
                group: group.key(),
                bytes_reclaimable: choice.reclaimable_bytes(),
                canonical: choice.canonical,
                to_delete: choice.to_delete,
                retained: choice.retained,
                references,
            };
            plan.duplicates += planned.to_delete.len();
            plan.references += planned.references;
            plan.bytes_reclaimable += planned.bytes_reclaimable;
            plan.groups.push(planned);
        }

        Ok(plan)
    }

    /// Merge every duplicate group and report the outcome.
    ///
    /// Only a failure to list the media library is returned as an error; group
    /// failures are recorded in the report.
    #[tracing::instrument(skip(self), fields(dedup.dry_run = self.options.dry_run))]
    pub async fn run(&self) -> Result<DedupReport, AppError> {
        let (assets_scanned, groups) = self.duplicate_groups().await?;
        tracing::info!(
            assets = assets_scanned,
            groups = groups.len(),
            "Starting media deduplication"
        );

        let mut report = ReportBuilder::new(self.options.dry_run);
        for (group, choice) in groups {
            let outcome = if self.options.dry_run {
                skipped(&group, &choice)
            } else {
                self.merge_group(&group, choice).await
            };
            report.push(outcome);
        }

        let report = report.finish();
        if report.has_failures() {
            tracing::warn!(failed = ?report.failed_groups, "{}", report.summary_line());
        } else {
            tracing::info!("{}", report.summary_line());
        }
        Ok(report)
    }

    #[tracing::instrument(
        skip(self, group, choice),
        fields(dedup.group = %group.key(), dedup.canonical_id = %choice.canonical.id)
    )]
    async fn merge_group(&self, group: &DuplicateGroup, choice: CanonicalChoice) -> GroupOutcome {
        let mut outcome = GroupOutcome::new(group.key(), &choice);

        if let Err(e) = self.drive_group(&choice, &mut outcome).await {
            let failed = if outcome.state == GroupState::Deleting {
                GroupState::DeleteFailed
            } else {
                GroupState::RewriteFailed
            };
            tracing::error!(error = %e, state = failed.as_str(), "Duplicate group failed");
            outcome.errors.push(e.to_string());
            outcome.state = failed;
            return outcome;
        }

        if outcome.is_failure() {
            tracing::warn!(
                state = outcome.state.as_str(),
                errors = outcome.errors.len(),
                references_restored = outcome.references_restored,
                "Duplicate group left undeleted"
            );
        } else {
            tracing::info!(
                deleted = outcome.deleted_ids.len(),
                retained = outcome.retained_ids.len(),
                references_rewritten = outcome.references_rewritten,
                bytes_reclaimed = outcome.bytes_reclaimed,
                "Merged duplicate group"
            );
        }
        outcome
    }

    /// Rewrite, verify, delete. Rewrite failures end the group in
    /// `RewriteFailed` with `Ok`; store errors bubble up to `merge_group`.
    async fn drive_group(
        &self,
        choice: &CanonicalChoice,
        outcome: &mut GroupOutcome,
    ) -> Result<(), AppError> {
        outcome.state = outcome.state.advance(GroupState::Rewriting)?;

        let canonical_url = choice.canonical.url.as_str();
        let doomed = doomed_urls(choice);
        let mut journal = RewriteJournal::default();
        let mut failures = Vec::new();

        for dup_url in &doomed {
            let result = self.rewriter.rewrite(dup_url, canonical_url, &mut journal).await;
            outcome.references_rewritten += result.references_rewritten;
            if !result.failures.is_empty() {
                failures.extend(result.failures);
                break;
            }
        }

        if !failures.is_empty() {
            outcome
                .errors
                .extend(failures.iter().map(ToString::to_string));
            if self.options.compensate_on_failure && !journal.is_empty() {
                let restored = self.rewriter.compensate(journal).await;
                outcome.references_restored = restored.references_restored;
                outcome
                    .errors
                    .extend(restored.failures.iter().map(|f| format!("restore failed: {f}")));
            }
            outcome.state = outcome.state.advance(GroupState::RewriteFailed)?;
            return Ok(());
        }

        if self.options.verify_before_delete && !doomed.is_empty() {
            let remaining = self.rewriter.verify(&doomed).await?;
            if remaining > 0 {
                tracing::warn!(remaining, "References to duplicate URLs remain after rewrite");
                outcome.errors.push(format!(
                    "{remaining} references to duplicate URLs remain after rewrite"
                ));
                outcome.state = outcome.state.advance(GroupState::RewriteFailed)?;
                return Ok(());
            }
        }

        outcome.state = outcome.state.advance(GroupState::RewriteComplete)?;
        if choice.to_delete.is_empty() {
            outcome.state = outcome.state.advance(GroupState::Done)?;
            return Ok(());
        }

        outcome.state = outcome.state.advance(GroupState::Deleting)?;
        let committed = self.committer.commit(&choice.to_delete).await?;
        outcome.deleted_ids = committed.deleted_ids;
        outcome.bytes_reclaimed = committed.bytes_reclaimed;
        outcome.state = outcome.state.advance(GroupState::Done)?;
        Ok(())
    }

    /// Every content row that references `url`.
    #[tracing::instrument(skip(self))]
    pub async fn usage(&self, url: &str) -> Result<Vec<ReferenceLocation>, AppError> {
        let mut locations = Vec::new();
        for field in UrlField::registry() {
            for row in self.content.find_referencing(field, url).await? {
                locations.push(ReferenceLocation {
                    table: field.table,
                    column: field.column,
                    row_id: row.row_id,
                    occurrences: row.value.references(url),
                });
            }
        }
        Ok(locations)
    }

    /// Unprotected assets that no content row references.
    #[tracing::instrument(skip(self))]
    pub async fn orphans(&self) -> Result<Vec<MediaAsset>, AppError> {
        let assets = self.media.list_all().await?;
        let index = ReferenceIndex::build(self.content.as_ref()).await?;
        Ok(index.unreferenced(&assets).into_iter().cloned().collect())
    }

    /// Delete a single asset from the media library.
    ///
    /// Protected assets are always refused. Assets still referenced by content
    /// are refused unless `force` is set.
    #[tracing::instrument(skip(self), fields(media.id = %id))]
    pub async fn delete_asset(&self, id: Uuid, force: bool) -> Result<MediaAsset, AppError> {
        let asset = self
            .media
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("media asset {id}")))?;

        if asset.is_protected {
            return Err(AppError::ProtectedAsset { ids: vec![id] });
        }

        let references = self.rewriter.verify(&[asset.url.as_str()]).await?;
        if references > 0 {
            if !force {
                return Err(AppError::StillReferenced { id, references });
            }
            tracing::warn!(references, url = %asset.url, "Force-deleting referenced asset");
        }

        let deleted = self.media.delete_batch(&[id]).await?;
        if deleted.is_empty() {
            return Err(AppError::NotFound(format!("media asset {id}")));
        }
        tracing::info!(url = %asset.url, bytes = asset.byte_size, "Deleted media asset");
        Ok(asset)
    }
}

/// URLs that disappear when the group's duplicates are deleted.
///
/// Excludes URLs shared with a surviving member, since references to those
/// stay valid.
fn doomed_urls(choice: &CanonicalChoice) -> Vec<&str> {
    let surviving: HashSet<&str> = std::iter::once(&choice.canonical)
        .chain(&choice.retained)
        .map(|a| a.url.as_str())
        .collect();
    let mut seen = HashSet::new();
    choice
        .to_delete
        .iter()
        .map(|a| a.url.as_str())
        .filter(|url| !surviving.contains(url) && seen.insert(*url))
        .collect()
}

fn skipped(group: &DuplicateGroup, choice: &CanonicalChoice) -> GroupOutcome {
    let mut outcome = GroupOutcome::new(group.key(), choice);
    outcome.state = GroupState::Skipped;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::test_support::{asset, day};

    #[test]
    fn doomed_urls_skip_surviving_and_repeated() {
        let a = asset("/a.jpg", "h", 1, day(1, 1));
        let mut keep = asset("/k.jpg", "h", 1, day(1, 2));
        keep.is_protected = true;
        let b = asset("/b.jpg", "h", 1, day(1, 3));
        let b_again = asset("/b.jpg", "h", 1, day(1, 4));
        let same_as_canonical = asset("/a.jpg", "h", 1, day(1, 5));
        let same_as_retained = asset("/k.jpg", "h", 1, day(1, 6));

        let choice = CanonicalChoice {
            canonical: a,
            to_delete: vec![b, b_again, same_as_canonical, same_as_retained],
            retained: vec![keep],
        };
        assert_eq!(doomed_urls(&choice), vec!["/b.jpg"]);
    }

    #[test]
    fn options_default_to_safe_merge() {
        let options = DedupOptions::default();
        assert!(!options.dry_run);
        assert!(options.compensate_on_failure);
        assert!(options.verify_before_delete);
    }
}
