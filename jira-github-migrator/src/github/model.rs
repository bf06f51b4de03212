//! GitHub data model: import payloads and the slices of the REST API the
//! migration consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The issue part of an import request, shaped for the asynchronous
/// issue import endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportIssue {
    pub title: String,
    pub body: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "github_datetime::serialize_opt"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "github_datetime::serialize_opt"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    pub closed: bool,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "github_datetime::serialize_opt"
    )]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// One comment of an import request.
#[derive(Debug, Clone, Serialize)]
pub struct ImportComment {
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "github_datetime::serialize_opt"
    )]
    pub created_at: Option<DateTime<Utc>>,
    pub body: String,
}

/// A pull request associated with an issue, referenced by destination
/// issue number. Not part of the import payload; linked in a second pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PullRequestRef {
    pub number: u64,
}

/// Complete payload for one asynchronous issue import. Built once per
/// source issue and never mutated after submission.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportRequest {
    pub issue: ImportIssue,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<ImportComment>,
    #[serde(skip)]
    pub pull_requests: Vec<PullRequestRef>,
}

/// Response of the import submission endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportResponse {
    /// Opaque status-check URL to poll.
    pub url: String,
    pub status: String,
}

impl ImportResponse {
    pub fn is_pending(&self) -> bool {
        self.status == "pending"
    }
}

/// Response of the import status-check endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportStatus {
    pub status: String,
    #[serde(default)]
    pub issue_url: Option<String>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

/// A destination milestone.
#[derive(Debug, Clone, Deserialize)]
pub struct Milestone {
    pub number: u64,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub due_on: Option<DateTime<Utc>>,
}

impl Milestone {
    pub fn is_closed(&self) -> bool {
        self.state == "closed"
    }
}

/// Confirmed milestone state of the destination repository, indexed by
/// title (the Jira version name).
#[derive(Debug, Clone, Default)]
pub struct MilestoneIndex {
    by_title: BTreeMap<String, Milestone>,
}

impl MilestoneIndex {
    pub fn new(milestones: Vec<Milestone>) -> Self {
        Self {
            by_title: milestones
                .into_iter()
                .map(|m| (m.title.clone(), m))
                .collect(),
        }
    }

    pub fn get(&self, title: &str) -> Option<&Milestone> {
        self.by_title.get(title)
    }

    pub fn contains(&self, title: &str) -> bool {
        self.by_title.contains_key(title)
    }

    pub fn len(&self) -> usize {
        self.by_title.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_title.is_empty()
    }
}

/// A label, as created on the destination repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSpec {
    pub name: String,
    pub color: String,
}

/// A destination issue comment body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueComment {
    pub body: String,
}

/// A destination repository issue, as listed by the issues endpoint. Used
/// by the mapping-rebuild mode.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoIssue {
    pub number: u64,
    pub title: String,
    /// Present when the "issue" is actually a pull request.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl RepoIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// Serde adapter for GitHub's ISO-8601 timestamps without fractional
/// seconds (`2013-05-21T10:21:14Z`).
pub mod github_datetime {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub(crate) fn format(dt: &DateTime<Utc>) -> String {
        dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    pub fn serialize_opt<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&format(dt)),
            None => serializer.serialize_none(),
        }
    }
}
