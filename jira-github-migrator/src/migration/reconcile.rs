//! Pending-run reconciliation.
//!
//! A prior run may have exited with imports accepted by the destination
//! but not yet confirmed. At the start of the next run, each pending key
//! is checked against the destination: once its issue exists, the pull
//! requests are linked, the close reason corrected, and the key promoted
//! to the completed table. Imports are never re-submitted here.

use super::context::MigrationContext;
use super::engine::{is_not_planned, ImportEngine};
use super::import_builder::pull_request_refs;
use crate::github::GithubClient;
use crate::jira::JiraIssue;
use crate::summary::{ProcessingOutcome, RunSummary};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Resolves the fate of every key left pending by a prior run.
pub async fn reconcile_pending(
    github: &GithubClient,
    context: &mut MigrationContext,
    issues: &[JiraIssue],
    summary: &mut RunSummary,
) {
    if context.pending().is_empty() {
        return;
    }
    info!(
        count = context.pending().len(),
        "Checking status of pending issues from previous run"
    );

    let engine = ImportEngine::new(github);
    let mut seen: BTreeSet<String> = BTreeSet::new();

    let pending_issues: Vec<&JiraIssue> = issues
        .iter()
        .filter(|issue| context.pending_issue_number(&issue.key).is_some())
        .collect();

    for issue in pending_issues {
        let Some(number) = context.pending_issue_number(&issue.key) else {
            continue;
        };
        seen.insert(issue.key.clone());

        match github.issue_exists(number).await {
            Ok(true) => {
                info!(key = %issue.key, issue_number = number, "Linking pull requests of confirmed issue");
                let title = issue.fields.summary.clone().unwrap_or_default();
                engine
                    .link_pull_requests(number, &title, &pull_request_refs(issue), context)
                    .await;
                if let Some(resolution) = issue.fields.resolution.as_ref() {
                    if is_not_planned(&resolution.name) {
                        engine
                            .update_close_reason(&issue.key, &github.issue_url(number))
                            .await;
                    }
                }
                context.promote(&issue.key);
                summary.record(&ProcessingOutcome::Promoted {
                    key: issue.key.clone(),
                    issue_number: number,
                });
            }
            Ok(false) => {
                warn!(key = %issue.key, issue_number = number, "GitHub issue is still pending");
                context.record_still_pending(&issue.key);
                summary.record(&ProcessingOutcome::StillPending {
                    key: issue.key.clone(),
                    issue_number: number,
                });
            }
            Err(e) => {
                warn!(key = %issue.key, issue_number = number, error = %e, "Pending check failed, leaving pending");
                context.add_failure_message(&format!(
                    "Failed to check pending issue {} (#{number}): {e}",
                    issue.key
                ));
                context.record_still_pending(&issue.key);
                summary.record(&ProcessingOutcome::StillPending {
                    key: issue.key.clone(),
                    issue_number: number,
                });
            }
        }
    }

    // Pending keys no longer matched by the source query must survive the
    // per-run truncation of the pending file.
    let unmatched: Vec<String> = context
        .pending()
        .keys()
        .filter(|key| !seen.contains(*key))
        .cloned()
        .collect();
    for key in unmatched {
        warn!(key, "Pending key not in the source result, carrying forward");
        context.record_still_pending(&key);
    }
}
