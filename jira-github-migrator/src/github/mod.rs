//! GitHub (destination tracker) data model and write client.

mod client;
mod error;
mod model;

pub use client::GithubClient;
pub use error::GithubError;
pub use model::{
    github_datetime, ImportComment, ImportIssue, ImportRequest, ImportResponse, ImportStatus,
    IssueComment, LabelSpec, Milestone, MilestoneIndex, PullRequestRef, RepoIssue,
};
