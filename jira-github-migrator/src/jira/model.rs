//! Jira data model.
//!
//! Read-only snapshots of source issues as returned by the Jira REST API.
//! Only the fields the migration renders are modeled; everything else is
//! ignored during deserialization.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

/// A Jira project, reduced to the versions that become milestones.
#[derive(Debug, Clone, Deserialize)]
pub struct JiraProject {
    pub key: String,
    #[serde(default)]
    pub versions: Vec<JiraVersion>,
}

/// A Jira version (project release), both in the project version list and
/// in an issue's affects/fix version lists.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JiraVersion {
    pub name: String,
    #[serde(default)]
    pub released: bool,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
}

impl JiraVersion {
    /// Sort key for picking the primary fix version: numeric components of
    /// the name, so "1.10" orders above "1.9".
    fn sort_key(&self) -> Vec<u64> {
        self.name
            .split(|c: char| !c.is_ascii_digit())
            .filter(|part| !part.is_empty())
            .filter_map(|part| part.parse().ok())
            .collect()
    }
}

/// A Jira user reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraUser {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl JiraUser {
    /// Stable identifier for the user map: the user key, falling back to
    /// the login name.
    pub fn id(&self) -> &str {
        self.key
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("unknown")
    }

    /// Human-readable name for attribution lines.
    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or_else(|| self.id())
    }
}

/// A single Jira comment, possibly restricted to a visibility group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraComment {
    #[serde(default)]
    pub author: Option<JiraUser>,
    #[serde(default)]
    pub body: String,
    #[serde(with = "jira_datetime")]
    pub created: DateTime<Utc>,
    #[serde(default)]
    visibility: Option<serde_json::Value>,
}

impl JiraComment {
    /// A comment with a visibility restriction is not migrated.
    pub fn is_restricted(&self) -> bool {
        self.visibility.is_some()
    }
}

/// The comment container of an issue.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentPage {
    #[serde(default)]
    pub comments: Vec<JiraComment>,
}

impl CommentPage {
    pub fn visible_comments(&self) -> impl Iterator<Item = &JiraComment> {
        self.comments.iter().filter(|c| !c.is_restricted())
    }

    pub fn has_restricted_comments(&self) -> bool {
        self.comments.iter().any(JiraComment::is_restricted)
    }
}

/// Typed, directional link between two issues.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLink {
    #[serde(rename = "type")]
    pub link_type: IssueLinkType,
    #[serde(default)]
    pub inward_issue: Option<LinkedIssue>,
    #[serde(default)]
    pub outward_issue: Option<LinkedIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueLinkType {
    #[serde(default)]
    pub inward: String,
    #[serde(default)]
    pub outward: String,
}

/// The far end of an issue link, and also the shape of subtask/parent stubs.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkedIssue {
    pub key: String,
    #[serde(default)]
    pub fields: Option<LinkedIssueFields>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkedIssueFields {
    #[serde(default)]
    pub summary: Option<String>,
}

impl LinkedIssue {
    pub fn summary(&self) -> &str {
        self.fields
            .as_ref()
            .and_then(|f| f.summary.as_deref())
            .unwrap_or_default()
    }
}

/// Attachment metadata; content is never transferred, only linked.
#[derive(Debug, Clone, Deserialize)]
pub struct JiraAttachment {
    pub filename: String,
    /// Download URL of the attachment content.
    pub content: String,
    #[serde(default)]
    pub size: u64,
}

impl JiraAttachment {
    /// Human-readable size, e.g. "4.17 kB".
    pub fn size_to_display(&self) -> String {
        const KB: f64 = 1024.0;
        const MB: f64 = 1024.0 * 1024.0;
        let size = self.size as f64;
        if size >= MB {
            format!("{:.2} MB", size / MB)
        } else if size >= KB {
            format!("{:.2} kB", size / KB)
        } else {
            format!("{} bytes", self.size)
        }
    }
}

/// An arbitrary remote link attached to an issue. Pull request references
/// are derived from these.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteLink {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// Wire shape of the `/issue/{key}/remotelink` resource; the interesting
/// parts are nested under `object`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemoteLinkResource {
    pub object: RemoteLink,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraResolution {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssueType {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraPriority {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraWatches {
    #[serde(default)]
    pub watch_count: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraVotes {
    #[serde(default)]
    pub votes: u32,
}

/// The `fields` object of an issue.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reporter: Option<JiraUser>,
    #[serde(default)]
    pub assignee: Option<JiraUser>,
    #[serde(with = "jira_datetime")]
    pub created: DateTime<Utc>,
    #[serde(with = "jira_datetime")]
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub resolution: Option<JiraResolution>,
    #[serde(default)]
    pub issuetype: Option<JiraIssueType>,
    #[serde(default)]
    pub priority: Option<JiraPriority>,
    /// Affected versions.
    #[serde(default)]
    pub versions: Vec<JiraVersion>,
    #[serde(default)]
    pub fix_versions: Vec<JiraVersion>,
    #[serde(default)]
    pub comment: CommentPage,
    #[serde(default)]
    pub issuelinks: Vec<IssueLink>,
    #[serde(default)]
    pub attachment: Vec<JiraAttachment>,
    #[serde(default)]
    pub subtasks: Vec<LinkedIssue>,
    #[serde(default)]
    pub parent: Option<LinkedIssue>,
    #[serde(default)]
    pub watches: JiraWatches,
    #[serde(default)]
    pub votes: JiraVotes,
    /// Issues carrying a security level are not public and are excluded
    /// from the migration.
    #[serde(default)]
    security: Option<serde_json::Value>,
    /// Project-specific custom field carrying a reference URL.
    #[serde(default, rename = "customfield_10600")]
    pub reference_url: Option<String>,
    /// Project-specific custom field carrying a pull request URL.
    #[serde(default, rename = "customfield_10684")]
    pub pull_request_url: Option<String>,
}

impl Fields {
    pub fn is_public(&self) -> bool {
        self.security.is_none()
    }
}

/// Immutable snapshot of one source issue.
#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    pub fields: Fields,
    /// Remote links, resolved with a follow-up request per issue.
    #[serde(skip)]
    pub remote_links: Vec<RemoteLink>,
    /// Commit URLs referenced from the issue.
    #[serde(skip)]
    pub commit_urls: Vec<String>,
}

impl JiraIssue {
    pub fn votes(&self) -> u32 {
        self.fields.votes.votes
    }

    /// The primary fix version: the highest-numbered entry of the fix
    /// version list, or the first entry when none of the names carry
    /// numeric components.
    pub fn fix_version(&self) -> Option<&JiraVersion> {
        let versions = &self.fields.fix_versions;
        versions
            .iter()
            .filter(|v| !v.sort_key().is_empty())
            .max_by_key(|v| v.sort_key())
            .or_else(|| versions.first())
    }

    /// Fix versions other than the primary one; a fix delivered in several
    /// releases was backported to these.
    pub fn backport_versions(&self) -> Vec<&JiraVersion> {
        let primary = self.fix_version().map(|v| v.name.clone());
        self.fields
            .fix_versions
            .iter()
            .filter(|v| Some(&v.name) != primary.as_ref())
            .collect()
    }

    /// Structural validity check: an issue without a summary can't be
    /// rendered and is skipped rather than failing the run.
    pub fn is_structurally_valid(&self) -> bool {
        !self.key.is_empty()
            && self
                .fields
                .summary
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty())
    }
}

/// One page of a JQL search.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchPage {
    pub start_at: u64,
    pub total: u64,
    pub issues: Vec<JiraIssue>,
}

/// Serde adapter for Jira's timestamp format (`2013-05-21T10:21:14.000+0000`).
pub mod jira_datetime {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub(crate) fn parse(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.3f%z")
            .or_else(|_| DateTime::parse_from_rfc3339(value))
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        parse(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue_with_fix_versions(names: &[&str]) -> JiraIssue {
        serde_json::from_value(json!({
            "key": "MNG-1",
            "fields": {
                "summary": "A summary",
                "created": "2013-05-21T10:21:14.000+0000",
                "updated": "2013-05-22T10:21:14.000+0000",
                "fixVersions": names.iter().map(|n| json!({"name": n})).collect::<Vec<_>>(),
            }
        }))
        .unwrap()
    }

    #[test]
    fn parses_jira_timestamps() {
        let parsed = jira_datetime::parse("2013-05-21T10:21:14.000+0200").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2013-05-21T08:21:14+00:00");
        assert!(jira_datetime::parse("2013-05-21T10:21:14Z").is_ok());
    }

    #[test]
    fn primary_fix_version_is_the_highest() {
        let issue = issue_with_fix_versions(&["0.9", "1.0", "0.10"]);
        assert_eq!(issue.fix_version().unwrap().name, "1.0");
        let backports: Vec<_> = issue
            .backport_versions()
            .into_iter()
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(backports, vec!["0.9", "0.10"]);
    }

    #[test]
    fn numeric_components_order_versions() {
        let issue = issue_with_fix_versions(&["1.9", "1.10"]);
        assert_eq!(issue.fix_version().unwrap().name, "1.10");
    }

    #[test]
    fn issue_without_fix_versions_has_no_primary() {
        let issue = issue_with_fix_versions(&[]);
        assert!(issue.fix_version().is_none());
        assert!(issue.backport_versions().is_empty());
    }

    #[test]
    fn restricted_comments_are_detected() {
        let page: CommentPage = serde_json::from_value(json!({
            "comments": [
                {"body": "public", "created": "2013-05-21T10:21:14.000+0000"},
                {
                    "body": "internal",
                    "created": "2013-05-21T10:21:14.000+0000",
                    "visibility": {"type": "group", "value": "staff"}
                }
            ]
        }))
        .unwrap();

        assert!(page.has_restricted_comments());
        assert_eq!(page.visible_comments().count(), 1);
    }

    #[test]
    fn structural_validity_requires_a_summary() {
        let issue: JiraIssue = serde_json::from_value(json!({
            "key": "MNG-2",
            "fields": {
                "created": "2013-05-21T10:21:14.000+0000",
                "updated": "2013-05-21T10:21:14.000+0000"
            }
        }))
        .unwrap();
        assert!(!issue.is_structurally_valid());
    }

    #[test]
    fn attachment_sizes_render_human_readable() {
        let attachment = |size| JiraAttachment {
            filename: "log.txt".to_string(),
            content: "https://jira/attachment/1".to_string(),
            size,
        };
        assert_eq!(attachment(512).size_to_display(), "512 bytes");
        assert_eq!(attachment(4268).size_to_display(), "4.17 kB");
        assert_eq!(attachment(3 * 1024 * 1024).size_to_display(), "3.00 MB");
    }
}
