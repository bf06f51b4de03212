//! Import submission and polling.
//!
//! The destination's issue import API is asynchronous: a submission returns
//! an opaque status-check URL, and the result must be polled until it
//! settles. Per submission the states are Submitted, then Pending (self-
//! looping while the destination processes), then Succeeded or Failed.
//! Every outcome is recorded through the mapping store exactly once.

use super::context::MigrationContext;
use crate::github::{GithubClient, GithubError, ImportRequest, ImportResponse, PullRequestRef};
use crate::summary::ProcessingOutcome;
use tracing::{debug, error, info, warn};
use url::Url;

/// Pending-result verification happens after every batch of this size,
/// purely to surface failures earlier; the final pass checks everything.
pub const IMPORT_BATCH_SIZE: usize = 100;

/// Poll budget per import. A submission still pending after this many
/// status checks is classified as failed so it is never surfaced for
/// pull-request linking.
pub const MAX_POLL_RETRIES: u32 = 5;

/// Resolutions mapped to the destination's `not_planned` close reason.
const NOT_PLANNED_RESOLUTIONS: [&str; 6] = [
    "Won't Fix",
    "Won't Do",
    "Abandoned",
    "Not A Bug",
    "Not A Problem",
    "Cannot Reproduce",
];

/// Whether a source resolution maps to the `not_planned` close reason.
pub fn is_not_planned(resolution: &str) -> bool {
    NOT_PLANNED_RESOLUTIONS.contains(&resolution)
}

/// One submission in flight, tracked from POST to settled outcome.
pub struct SubmittedImport {
    /// Source key; absent for backport holders, which are milestone-scoped
    /// and never key-mapped.
    key: Option<String>,
    /// Milestone title for backport holders.
    milestone_title: Option<String>,
    title: String,
    resolution: Option<String>,
    pull_requests: Vec<PullRequestRef>,
    response: Option<ImportResponse>,
    issue_number: Option<u64>,
    failure: Option<String>,
}

impl SubmittedImport {
    pub fn issue_number(&self) -> Option<u64> {
        self.issue_number
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn pull_requests(&self) -> &[PullRequestRef] {
        &self.pull_requests
    }

    /// Human reference for logs and the failures file.
    fn reference(&self) -> String {
        match (&self.key, &self.milestone_title) {
            (Some(key), _) => key.clone(),
            (None, Some(milestone)) => format!("{milestone} backports"),
            (None, None) => self.title.clone(),
        }
    }

    /// The settled outcome, for the run summary. Meaningful once verified.
    pub fn outcome(&self) -> ProcessingOutcome {
        match (self.issue_number, &self.key) {
            (Some(number), Some(key)) => {
                if self.response.as_ref().is_some_and(ImportResponse::is_pending) {
                    ProcessingOutcome::Pending {
                        key: key.clone(),
                        issue_number: number,
                    }
                } else {
                    ProcessingOutcome::Imported {
                        key: key.clone(),
                        issue_number: number,
                    }
                }
            }
            (Some(_), None) => ProcessingOutcome::HolderImported {
                milestone: self.milestone_title.clone().unwrap_or_default(),
            },
            (None, _) => {
                let reason = self
                    .failure
                    .clone()
                    .unwrap_or_else(|| "unknown failure".to_string());
                match &self.milestone_title {
                    Some(milestone) => ProcessingOutcome::HolderFailed {
                        milestone: milestone.clone(),
                        reason,
                    },
                    None => ProcessingOutcome::Failed {
                        reference: self.reference(),
                        reason,
                    },
                }
            }
        }
    }
}

/// Drives submissions through the rate-limited import protocol.
pub struct ImportEngine<'a> {
    github: &'a GithubClient,
}

impl<'a> ImportEngine<'a> {
    pub fn new(github: &'a GithubClient) -> Self {
        Self { github }
    }

    /// Submits one issue import. Network failure here is a per-item
    /// failure, recorded when the result is verified.
    pub async fn submit_issue(
        &self,
        key: &str,
        resolution: Option<&str>,
        request: &ImportRequest,
        context: &mut MigrationContext,
    ) -> SubmittedImport {
        let submitted = SubmittedImport {
            key: Some(key.to_string()),
            milestone_title: None,
            title: request.issue.title.clone(),
            resolution: resolution.map(str::to_string),
            pull_requests: request.pull_requests.clone(),
            response: None,
            issue_number: None,
            failure: None,
        };
        self.submit(submitted, request, context).await
    }

    /// Submits one backport holder import.
    pub async fn submit_holder(
        &self,
        milestone_title: &str,
        request: &ImportRequest,
        context: &mut MigrationContext,
    ) -> SubmittedImport {
        let submitted = SubmittedImport {
            key: None,
            milestone_title: Some(milestone_title.to_string()),
            title: request.issue.title.clone(),
            resolution: None,
            pull_requests: Vec::new(),
            response: None,
            issue_number: None,
            failure: None,
        };
        self.submit(submitted, request, context).await
    }

    async fn submit(
        &self,
        mut submitted: SubmittedImport,
        request: &ImportRequest,
        context: &mut MigrationContext,
    ) -> SubmittedImport {
        debug!(reference = %submitted.reference(), "Submitting import");
        match self.github.submit_import(request).await {
            Ok(response) => submitted.response = Some(response),
            Err(e) => {
                let message = format!("Failed to POST import for \"{}\"", submitted.title);
                error!(error = %e, "{}", message);
                context.add_failure_message(&format!("{message}: {e}"));
            }
        }
        submitted
    }

    /// Polls a submission to a terminal state and records its outcome.
    /// Idempotent: a submission that already settled is not re-polled or
    /// re-recorded.
    pub async fn verify(
        &self,
        submitted: &mut SubmittedImport,
        context: &mut MigrationContext,
    ) -> bool {
        if submitted.issue_number.is_some() {
            return true;
        }
        if submitted.failure.is_some() {
            return false;
        }
        let success = self.poll(submitted).await;
        self.record(submitted, context);
        success
    }

    async fn poll(&self, submitted: &mut SubmittedImport) -> bool {
        let Some(response) = submitted.response.clone() else {
            submitted.failure = Some("No body from import request".to_string());
            return false;
        };

        let mut retries = 0;
        loop {
            if retries == MAX_POLL_RETRIES {
                error!(
                    reference = %submitted.reference(),
                    retries, "Import failed after max retries"
                );
                // Classified as a failure rather than left unresolved so the
                // issue is never surfaced for pull-request linking.
                submitted.failure = Some(format!("failed after {retries} retries"));
                return false;
            }
            retries += 1;

            // Each status check re-acquires a rate-limit permit; there is no
            // tight poll loop.
            let status = match self.github.import_status(&response.url).await {
                Ok(status) => status,
                Err(e) => {
                    error!(url = %response.url, error = %e, "Import status check failed");
                    submitted.failure = Some(e.to_string());
                    return false;
                }
            };

            match status.status.as_str() {
                "failed" => {
                    let detail = status
                        .errors
                        .map(|errors| errors.to_string())
                        .unwrap_or_default();
                    submitted.failure = Some(format!("status: failed {detail}"));
                    return false;
                }
                "pending" => {
                    debug!(reference = %submitted.reference(), "Import still pending");
                    continue;
                }
                _ => {
                    let Some(issue_url) = status.issue_url else {
                        submitted.failure =
                            Some(format!("No URL for imported issue: {}", status.status));
                        return false;
                    };
                    if let Some(resolution) = submitted.resolution.as_deref() {
                        if is_not_planned(resolution) {
                            self.update_close_reason(&submitted.reference(), &issue_url).await;
                        }
                    }
                    match issue_number_from_url(&issue_url) {
                        Some(number) => {
                            submitted.issue_number = Some(number);
                            return true;
                        }
                        None => {
                            submitted.failure =
                                Some(format!("Can't parse issue number from '{issue_url}'"));
                            return false;
                        }
                    }
                }
            }
        }
    }

    /// Best-effort close-reason correction; failure never flips the
    /// import's outcome.
    pub async fn update_close_reason(&self, reference: &str, issue_url: &str) {
        match self.github.mark_not_planned(issue_url).await {
            Ok(()) => info!(reference, "Updated state reason to not_planned"),
            Err(e) => warn!(reference, error = %e, "Closed reason update failed"),
        }
    }

    fn record(&self, submitted: &SubmittedImport, context: &mut MigrationContext) {
        match (submitted.issue_number, submitted.key.as_deref()) {
            (Some(number), Some(key)) => {
                // The submit response almost always reports pending; such
                // keys stay in the pending table until the next run's
                // reconciliation confirms the destination finished.
                if submitted.response.as_ref().is_some_and(ImportResponse::is_pending) {
                    context.record_pending(key, number);
                } else {
                    context.record_completed(key, number);
                }
            }
            (Some(_), None) => context.record_backport_holder(),
            (None, _) => {
                let reason = submitted.failure.as_deref().unwrap_or("unknown failure");
                context.record_failed_import(&submitted.reference(), reason);
            }
        }
    }

    /// Adds a `Resolve #issue` comment to each associated pull request,
    /// skipping pull requests that already carry one. Failures are
    /// best-effort: logged and written to the failures file.
    pub async fn link_pull_requests(
        &self,
        issue_number: u64,
        issue_title: &str,
        pull_requests: &[PullRequestRef],
        context: &mut MigrationContext,
    ) {
        for pull_request in pull_requests {
            if let Err(e) = self.link_one(issue_number, pull_request.number).await {
                let message =
                    format!("Failed to POST link pull request for \"{issue_title}\"");
                error!(error = %e, "{}", message);
                context.add_failure_message(&format!("{message}: {e}"));
            }
        }
    }

    async fn link_one(&self, issue_number: u64, pull_request: u64) -> Result<(), GithubError> {
        let comments = self.github.issue_comments(pull_request).await?;
        if comments.iter().any(|c| c.body.contains("Resolve #")) {
            info!(pull_request, "Resolve comment already exists");
            return Ok(());
        }
        self.github
            .create_issue_comment(pull_request, &format!("Resolve #{issue_number}"))
            .await
    }
}

fn issue_number_from_url(url: &str) -> Option<u64> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_planned_vocabulary() {
        assert!(is_not_planned("Won't Fix"));
        assert!(is_not_planned("Cannot Reproduce"));
        assert!(!is_not_planned("Fixed"));
        assert!(!is_not_planned("Done"));
    }

    #[test]
    fn issue_numbers_parse_from_the_trailing_segment() {
        assert_eq!(
            issue_number_from_url("https://api.github.com/repos/acme/maven/issues/42"),
            Some(42)
        );
        assert_eq!(
            issue_number_from_url("https://api.github.com/repos/acme/maven/issues/42/"),
            Some(42)
        );
        assert_eq!(
            issue_number_from_url("https://api.github.com/repos/acme/maven"),
            None
        );
        assert_eq!(issue_number_from_url("not a url"), None);
    }
}
