//! Backport aggregation.
//!
//! A fix delivered in several releases shows up once per backport version.
//! Rather than importing duplicates, each backport milestone gets one
//! synthetic "holder" issue listing the backported issues, built after the
//! base issues are confirmed so their destination numbers are known.

use super::context::MigrationContext;
use crate::github::{ImportIssue, ImportRequest, Milestone, MilestoneIndex};
use crate::jira::JiraIssue;
use crate::markup::MarkupManager;
use tracing::debug;

/// Issues grouped under one backport milestone, in work-list order.
pub struct BackportGroup<'a> {
    pub milestone: &'a Milestone,
    pub issues: Vec<&'a JiraIssue>,
}

/// Groups this run's issues by backport milestone.
///
/// An issue lands in a group for every backport version that maps to a
/// known milestone; its primary fix version never groups it.
pub fn collect_backports<'a, I>(issues: I, milestones: &'a MilestoneIndex) -> Vec<BackportGroup<'a>>
where
    I: IntoIterator<Item = &'a JiraIssue>,
{
    let mut groups: Vec<BackportGroup<'a>> = Vec::new();
    for issue in issues {
        for version in issue.backport_versions() {
            let Some(milestone) = milestones.get(&version.name) else {
                continue;
            };
            match groups.iter_mut().find(|g| g.milestone.number == milestone.number) {
                Some(group) => group.issues.push(issue),
                None => groups.push(BackportGroup {
                    milestone,
                    issues: vec![issue],
                }),
            }
        }
    }
    groups
}

/// Builds the holder import request for one group.
///
/// A grouped issue without a confirmed destination number is recorded as a
/// run failure message but doesn't abort the holder.
pub fn holder_request(
    group: &BackportGroup<'_>,
    context: &mut MigrationContext,
    markup: &MarkupManager,
) -> ImportRequest {
    let milestone = group.milestone;
    debug!(milestone = %milestone.title, issues = group.issues.len(), "Building backport holder");

    let mut issue = ImportIssue {
        title: format!("{} Backported Issues", milestone.title),
        milestone: Some(milestone.number),
        ..ImportIssue::default()
    };
    if let Some(due_on) = milestone.due_on {
        issue.created_at = Some(due_on);
        if milestone.is_closed() {
            issue.closed_at = Some(due_on);
        }
    }
    if milestone.is_closed() {
        issue.closed = true;
    }

    let mut lines = Vec::with_capacity(group.issues.len());
    for jira_issue in &group.issues {
        let summary = jira_issue.fields.summary.as_deref().unwrap_or_default();
        match context.github_issue_number(&jira_issue.key) {
            Some(number) => lines.push(format!("- {summary} #{number}")),
            None => {
                context.add_failure_message(&format!(
                    "{} backport issues holder is missing the GitHub issue id for {}",
                    milestone.title, jira_issue.key
                ));
                lines.push(format!("- {summary} #?"));
            }
        }
    }
    // The engine escapes annotations colliding with GitHub mentions.
    let engine = markup.engine(group.issues[0].fields.created);
    issue.body = engine.convert(&lines.join("\n"));

    ImportRequest {
        issue,
        comments: Vec::new(),
        pull_requests: Vec::new(),
    }
}
