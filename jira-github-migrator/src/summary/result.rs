//! Per-item processing outcomes.

/// The settled outcome of processing one work item.
#[derive(Debug, Clone)]
pub enum ProcessingOutcome {
    /// Import confirmed; key recorded in the completed table.
    Imported { key: String, issue_number: u64 },

    /// Import accepted, destination still processing; key recorded in the
    /// pending table for the next run's reconciliation.
    Pending { key: String, issue_number: u64 },

    /// Import failed (validation, transport, or poll budget exhaustion).
    Failed { reference: String, reason: String },

    /// Structurally invalid source issue, skipped without network calls.
    Skipped { key: String, reason: String },

    /// Backport holder imported.
    HolderImported { milestone: String },

    /// Backport holder failed.
    HolderFailed { milestone: String, reason: String },

    /// A previously-pending key confirmed and promoted to completed.
    Promoted { key: String, issue_number: u64 },

    /// A previously-pending key whose destination issue still doesn't
    /// exist; left pending for a future run.
    StillPending { key: String, issue_number: u64 },
}
