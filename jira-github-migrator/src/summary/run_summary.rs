//! Run summary types.

use super::result::ProcessingOutcome;

/// Aggregated counts for a complete run; the operator's go/no-go signal
/// for re-running.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Imports confirmed and recorded as completed this run.
    pub issues_imported: usize,

    /// Imports accepted but left pending for the next run.
    pub issues_pending: usize,

    /// Imports that failed (validation, transport, or retry budget).
    pub issues_failed: usize,

    /// Structurally invalid issues skipped without network calls.
    pub issues_skipped: usize,

    /// Previously-pending keys confirmed and promoted this run.
    pub issues_promoted: usize,

    /// Previously-pending keys still unconfirmed.
    pub issues_still_pending: usize,

    /// Backport holder issues imported.
    pub backport_holders_created: usize,

    /// Backport holder issues that failed.
    pub backport_holders_failed: usize,

    /// Whether this was a non-destructive test-mode run.
    pub test_mode: bool,
}

impl RunSummary {
    /// Creates a new empty summary.
    #[must_use]
    pub fn new(test_mode: bool) -> Self {
        Self {
            test_mode,
            ..Default::default()
        }
    }

    /// Updates the summary with one processing outcome.
    pub fn record(&mut self, outcome: &ProcessingOutcome) {
        match outcome {
            ProcessingOutcome::Imported { .. } => self.issues_imported += 1,
            ProcessingOutcome::Pending { .. } => self.issues_pending += 1,
            ProcessingOutcome::Failed { .. } => self.issues_failed += 1,
            ProcessingOutcome::Skipped { .. } => self.issues_skipped += 1,
            ProcessingOutcome::HolderImported { .. } => self.backport_holders_created += 1,
            ProcessingOutcome::HolderFailed { .. } => self.backport_holders_failed += 1,
            ProcessingOutcome::Promoted { .. } => self.issues_promoted += 1,
            ProcessingOutcome::StillPending { .. } => self.issues_still_pending += 1,
        }
    }

    /// Returns true if any import failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.issues_failed > 0 || self.backport_holders_failed > 0
    }

    /// Issues this run touched through the import pipeline.
    #[must_use]
    pub fn issues_processed(&self) -> usize {
        self.issues_imported + self.issues_pending + self.issues_failed + self.issues_skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_record_outcomes() {
        let mut summary = RunSummary::new(false);

        summary.record(&ProcessingOutcome::Imported {
            key: "MNG-1".to_string(),
            issue_number: 11,
        });
        summary.record(&ProcessingOutcome::Pending {
            key: "MNG-2".to_string(),
            issue_number: 12,
        });
        summary.record(&ProcessingOutcome::Failed {
            reference: "MNG-3".to_string(),
            reason: "failed after 5 retries".to_string(),
        });
        summary.record(&ProcessingOutcome::Skipped {
            key: "MNG-4".to_string(),
            reason: "missing summary".to_string(),
        });

        assert_eq!(summary.issues_imported, 1);
        assert_eq!(summary.issues_pending, 1);
        assert_eq!(summary.issues_failed, 1);
        assert_eq!(summary.issues_skipped, 1);
        assert_eq!(summary.issues_processed(), 4);
        assert!(summary.has_failures());
    }

    #[test]
    fn holder_failures_count_as_failures() {
        let mut summary = RunSummary::new(false);
        assert!(!summary.has_failures());

        summary.record(&ProcessingOutcome::HolderFailed {
            milestone: "0.9".to_string(),
            reason: "status: failed".to_string(),
        });
        assert!(summary.has_failures());
    }
}
