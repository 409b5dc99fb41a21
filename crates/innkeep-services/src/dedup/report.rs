use chrono::{DateTime, Utc};
use innkeep_core::models::{DedupReport, GroupOutcome};

/// Accumulates group outcomes into a [`DedupReport`].
#[derive(Debug)]
pub struct ReportBuilder {
    dry_run: bool,
    started_at: DateTime<Utc>,
    outcomes: Vec<GroupOutcome>,
}

impl ReportBuilder {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            started_at: Utc::now(),
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: GroupOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn finish(self) -> DedupReport {
        let mut report = DedupReport {
            dry_run: self.dry_run,
            started_at: self.started_at,
            finished_at: Utc::now(),
            groups_processed: self.outcomes.len(),
            duplicates_planned: 0,
            duplicates_removed: 0,
            bytes_reclaimable: 0,
            bytes_reclaimed: 0,
            references_rewritten: 0,
            failed_groups: Vec::new(),
            outcomes: Vec::new(),
        };

        for outcome in &self.outcomes {
            report.duplicates_planned += outcome.planned_ids.len();
            report.duplicates_removed += outcome.deleted_ids.len();
            report.bytes_reclaimable += outcome.bytes_reclaimable;
            report.bytes_reclaimed += outcome.bytes_reclaimed;
            // Restored rows no longer point at the canonical.
            report.references_rewritten += outcome
                .references_rewritten
                .saturating_sub(outcome.references_restored);
            if outcome.is_failure() {
                report.failed_groups.push(outcome.group.clone());
            }
        }
        report.outcomes = self.outcomes;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::test_support::{asset, day};
    use innkeep_core::models::{CanonicalChoice, GroupState};

    fn outcome(key: &str, state: GroupState, deleted: bool) -> GroupOutcome {
        let a = asset("/a.jpg", "h", 50, day(1, 1));
        let b = asset("/b.jpg", "h", 50, day(1, 2));
        let choice = CanonicalChoice {
            canonical: a,
            to_delete: vec![b.clone()],
            retained: Vec::new(),
        };
        let mut outcome = GroupOutcome::new(key.to_string(), &choice);
        outcome.state = state;
        outcome.references_rewritten = 2;
        if deleted {
            outcome.deleted_ids.push(b.id);
            outcome.bytes_reclaimed = b.byte_size;
        }
        outcome
    }

    #[test]
    fn sums_outcomes_and_lists_failures() {
        let mut builder = ReportBuilder::new(false);
        builder.push(outcome("h1:50", GroupState::Done, true));
        builder.push(outcome("h2:50", GroupState::DeleteFailed, false));
        let report = builder.finish();

        assert_eq!(report.groups_processed, 2);
        assert_eq!(report.duplicates_planned, 2);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.bytes_reclaimable, 100);
        assert_eq!(report.bytes_reclaimed, 50);
        assert_eq!(report.references_rewritten, 4);
        assert_eq!(report.failed_groups, vec!["h2:50".to_string()]);
        assert!(report.has_failures());
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn restored_references_are_not_counted() {
        let mut failed = outcome("h1:50", GroupState::RewriteFailed, false);
        failed.references_restored = 2;
        let mut builder = ReportBuilder::new(false);
        builder.push(failed);
        let report = builder.finish();

        assert_eq!(report.references_rewritten, 0);
        assert_eq!(report.bytes_reclaimed, 0);
    }

    #[test]
    fn empty_run() {
        let report = ReportBuilder::new(true).finish();
        assert_eq!(report.groups_processed, 0);
        assert!(!report.has_failures());
        assert!(report.summary_line().starts_with("0 duplicate groups found"));
    }
}
