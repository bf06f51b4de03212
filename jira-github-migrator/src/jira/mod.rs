//! Jira (source tracker) data model and read client.

mod client;
mod error;
mod model;

pub use client::JiraClient;
pub use error::JiraError;
pub use model::{
    jira_datetime, CommentPage, Fields, IssueLink, IssueLinkType, JiraAttachment, JiraComment,
    JiraIssue, JiraIssueType, JiraPriority, JiraProject, JiraResolution, JiraUser, JiraVersion,
    JiraVotes, JiraWatches, LinkedIssue, LinkedIssueFields, RemoteLink,
};
