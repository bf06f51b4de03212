//! GitHub client error types.

use thiserror::Error;

/// Errors that can occur while talking to the GitHub API.
#[derive(Debug, Error)]
pub enum GithubError {
    /// Transport-level failure, including undecodable response bodies.
    #[error("GitHub API request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// GitHub returned a non-success status.
    #[error("GitHub API returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
}

impl GithubError {
    /// Whether this error is a plain 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}
