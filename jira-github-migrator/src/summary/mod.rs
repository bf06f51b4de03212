//! Run summary reporting.

mod result;
mod run_summary;

pub use result::ProcessingOutcome;
pub use run_summary::RunSummary;
