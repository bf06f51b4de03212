//! Jira client error types.

use thiserror::Error;

/// Errors that can occur while reading from Jira.
#[derive(Debug, Error)]
pub enum JiraError {
    /// Transport-level failure.
    #[error("Jira API request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Jira returned a non-success status.
    #[error("Jira API returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
}
