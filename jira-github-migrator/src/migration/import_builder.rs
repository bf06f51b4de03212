//! Builds destination import requests from source issues.

use super::rules::LabelHandler;
use crate::config::{GithubConfig, JiraConfig};
use crate::github::{ImportComment, ImportIssue, ImportRequest, MilestoneIndex, PullRequestRef};
use crate::jira::{JiraIssue, JiraUser};
use crate::markup::{Markup, MarkupManager};
use std::collections::HashMap;
use thiserror::Error;

/// Link types rendered without a type annotation.
const SUPPRESSED_LINK_TYPES: [&str; 2] = ["relates to", "is related to"];

/// A source issue that can't be rendered at all. Fatal for the single
/// issue, never for the run.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Issue {key} is structurally invalid: missing summary")]
    MissingSummary { key: String },
}

/// Converts one source issue into an import request.
///
/// Every step is a deterministic function of the source snapshot, the
/// confirmed milestone index and the restricted-key set; missing optional
/// data never fails the build.
pub struct ImportBuilder<'a> {
    jira: &'a JiraConfig,
    github: &'a GithubConfig,
    user_mappings: &'a HashMap<String, String>,
    markup: &'a MarkupManager,
    label_handler: &'a dyn LabelHandler,
    milestones: &'a MilestoneIndex,
    restricted_keys: &'a [String],
}

impl<'a> ImportBuilder<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jira: &'a JiraConfig,
        github: &'a GithubConfig,
        user_mappings: &'a HashMap<String, String>,
        markup: &'a MarkupManager,
        label_handler: &'a dyn LabelHandler,
        milestones: &'a MilestoneIndex,
        restricted_keys: &'a [String],
    ) -> Self {
        Self {
            jira,
            github,
            user_mappings,
            markup,
            label_handler,
            milestones,
            restricted_keys,
        }
    }

    /// Builds the import request for one issue.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if the snapshot is structurally invalid.
    pub fn build(&self, issue: &JiraIssue) -> Result<ImportRequest, BuildError> {
        if !issue.is_structurally_valid() {
            return Err(BuildError::MissingSummary {
                key: issue.key.clone(),
            });
        }
        let fields = &issue.fields;
        let engine = self.markup.engine(fields.created);
        let summary = fields.summary.as_deref().unwrap_or_default();

        let mut import_issue = ImportIssue {
            title: format!("[{}] {}", issue.key, summary),
            body: self.body(issue, engine),
            created_at: Some(fields.created),
            updated_at: Some(fields.updated),
            closed: false,
            closed_at: None,
            assignee: None,
            milestone: None,
            labels: self.label_handler.labels_for(issue),
        };

        // An issue is open or closed based on its resolution field, not its
        // status field: open while resolution is unset, closed once it has a
        // value, whatever the status says.
        if fields.resolution.is_some() {
            import_issue.closed = true;
            import_issue.closed_at = Some(fields.updated);
        }

        // Actual assignees can't be used in test mode; they're probably not
        // contributors in the test repository.
        if !self.github.test_mode() {
            import_issue.assignee = fields
                .assignee
                .as_ref()
                .and_then(|assignee| self.user_mappings.get(assignee.id()))
                .cloned();
        }

        if let Some(fix_version) = issue.fix_version() {
            import_issue.milestone = self.milestones.get(&fix_version.name).map(|m| m.number);
        }

        Ok(ImportRequest {
            issue: import_issue,
            comments: self.comments(issue, engine),
            pull_requests: pull_request_refs(issue),
        })
    }

    fn user_link(&self, user: Option<&JiraUser>, engine: &dyn Markup) -> String {
        match user {
            Some(user) => engine.link(
                user.display(),
                &self.jira.profile_url(user.name.as_deref().unwrap_or_else(|| user.id())),
            ),
            None => "Unknown".to_string(),
        }
    }

    fn issue_link(&self, key: &str, engine: &dyn Markup) -> String {
        engine.link(key, &self.jira.browse_url(key))
    }

    fn body(&self, issue: &JiraIssue, engine: &dyn Markup) -> String {
        let fields = &issue.fields;
        let reporter_link = self.user_link(fields.reporter.as_ref(), engine);
        let issue_link = engine.link(
            &issue.key,
            &format!("{}?redirect=false", self.jira.browse_url(&issue.key)),
        );

        let mut body = format!(
            "**{reporter_link}** opened **{issue_link}**{} and commented\n",
            if fields.comment.has_restricted_comments() {
                "*"
            } else {
                ""
            }
        );

        if let Some(description) = fields.description.as_deref() {
            body.push('\n');
            body.push_str(&engine.convert(strip_trailing_rule(description)));
        }

        let details = self.jira_details(issue, engine);
        body.push_str("\n\n---\n");
        if details.trim().is_empty() {
            body.push_str(&format!("No further details from {issue_link}"));
        } else {
            body.push_str(&details);
        }
        body
    }

    /// Assembles the details block in its fixed order.
    fn jira_details(&self, issue: &JiraIssue, engine: &dyn Markup) -> String {
        let fields = &issue.fields;
        let mut details = String::new();

        if !fields.versions.is_empty() {
            let names: Vec<&str> = fields.versions.iter().map(|v| v.name.as_str()).collect();
            details.push_str(&format!("\n**Affects:** {}\n", names.join(", ")));
        }

        if let Some(reference_url) = fields.reference_url.as_deref() {
            details.push_str(&format!("\n**Reference URL:** {reference_url}\n"));
        }

        if !fields.attachment.is_empty() {
            details.push_str("\n**Attachments:**\n");
            for attachment in &fields.attachment {
                details.push_str(&format!(
                    "- {} (_{}_)\n",
                    engine.link(&attachment.filename, &attachment.content),
                    attachment.size_to_display()
                ));
            }
        }

        if let Some(parent) = fields.parent.as_ref() {
            let issue_type = fields.issuetype.as_ref().map(|t| t.name.as_str());
            let sub_task_type = if issue_type.is_some_and(|t| t.eq_ignore_ascii_case("Backport")) {
                "backport sub-task"
            } else {
                "sub-task"
            };
            details.push_str(&format!(
                "\nThis issue is a {sub_task_type} of {}\n",
                self.issue_link(&parent.key, engine)
            ));
        }

        let subtasks: Vec<_> = fields
            .subtasks
            .iter()
            .filter(|subtask| !self.restricted_keys.contains(&subtask.key))
            .collect();
        if !subtasks.is_empty() {
            details.push_str("\n**Sub-tasks:**\n");
            for subtask in subtasks {
                // Summaries go through the engine to escape annotations
                // colliding with GitHub mentions.
                details.push_str(&format!(
                    "- {} {}\n",
                    self.issue_link(&subtask.key, engine),
                    engine.convert(subtask.summary())
                ));
            }
        }

        let issue_links: Vec<_> = fields
            .issuelinks
            .iter()
            .filter_map(|link| {
                // Resolve the correct directional end of the link.
                let (target, link_type) = match (&link.outward_issue, &link.inward_issue) {
                    (Some(outward), _) => (outward, link.link_type.outward.as_str()),
                    (None, Some(inward)) => (inward, link.link_type.inward.as_str()),
                    (None, None) => return None,
                };
                (!self.restricted_keys.contains(&target.key)).then_some((target, link_type))
            })
            .collect();
        if !issue_links.is_empty() {
            details.push_str("\n**Issue Links:**\n");
            for (target, link_type) in issue_links {
                let annotation = if SUPPRESSED_LINK_TYPES.contains(&link_type) {
                    String::new()
                } else {
                    format!(" (_**\"{link_type}\"**_)")
                };
                details.push_str(&format!(
                    "- {} {}{annotation}\n",
                    self.issue_link(&target.key, engine),
                    engine.convert(target.summary())
                ));
            }
        }

        if !issue.remote_links.is_empty() {
            details.push_str("\n**Remote Links:**\n");
            for link in &issue.remote_links {
                details.push_str(&format!(
                    "- {}\n",
                    engine.link(&engine.convert(&link.title), &link.url)
                ));
            }
        }

        let mut references = Vec::new();
        if let Some(pull_request_url) = fields.pull_request_url.as_deref() {
            // Linking actual pull requests generates timeline events, so
            // test-mode runs leave them out.
            if !self.github.test_mode() {
                references.push(format!("pull request {pull_request_url}"));
            }
        }
        if !issue.commit_urls.is_empty() {
            references.push(format!("commits {}", issue.commit_urls.join(", ")));
        }
        if !references.is_empty() {
            details.push_str(&format!(
                "\n**Referenced from:** {}\n",
                references.join(", and ")
            ));
        }

        let backports = issue.backport_versions();
        if !backports.is_empty() {
            let rendered: Vec<String> = backports
                .iter()
                .map(|version| match self.milestones.get(&version.name) {
                    Some(milestone) => engine.link(
                        &version.name,
                        &format!(
                            "https://github.com/{}/milestone/{}?closed=1",
                            self.github.repository_slug, milestone.number
                        ),
                    ),
                    None => version.name.clone(),
                })
                .collect();
            details.push_str(&format!("\n**Backported to:** {}\n", rendered.join(", ")));
        }

        let watch_count = fields.watches.watch_count;
        if issue.votes() > 0 || watch_count >= 5 {
            details.push_str(&format!(
                "\n{} votes, {watch_count} watchers\n",
                issue.votes()
            ));
        }

        details
    }

    fn comments(&self, issue: &JiraIssue, engine: &dyn Markup) -> Vec<ImportComment> {
        issue
            .fields
            .comment
            .visible_comments()
            .map(|comment| {
                let author_link = self.user_link(comment.author.as_ref(), engine);
                ImportComment {
                    created_at: Some(comment.created),
                    body: format!(
                        "**{author_link}** commented\n\n{}",
                        engine.convert(&comment.body)
                    ),
                }
            })
            .collect()
    }
}

/// Pull request references derived from an issue's remote links: URLs with
/// a `pull` segment whose trailing path segment is an integer.
pub fn pull_request_refs(issue: &JiraIssue) -> Vec<PullRequestRef> {
    issue
        .remote_links
        .iter()
        .filter(|link| link.url.contains("pull"))
        .filter_map(|link| {
            link.url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .and_then(|segment| segment.parse().ok())
        })
        .map(|number| PullRequestRef { number })
        .collect()
}

/// Strips a trailing horizontal-rule artifact left by the source tracker's
/// rich-text editor.
fn strip_trailing_rule(description: &str) -> &str {
    if let Some(index) = description.rfind("----") {
        if description[index + 4..].trim().is_empty() {
            return &description[..index];
        }
    }
    description
}
