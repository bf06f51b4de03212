//! GitHub write client.
//!
//! Thin REST layer over the endpoints the migration consumes. Every call
//! acquires a permit from the shared rate-limit governor first; the
//! asynchronous import endpoints additionally request the import preview
//! media type.

use super::error::GithubError;
use super::model::{
    ImportRequest, ImportResponse, ImportStatus, IssueComment, LabelSpec, Milestone, RepoIssue,
};
use crate::config::GithubConfig;
use crate::rate_limit::RateLimiter;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Media type of the asynchronous issue import preview API.
const IMPORT_MEDIA_TYPE: &str = "application/vnd.github.golden-comet-preview+json";

const PAGE_SIZE: u32 = 100;

/// Client for the GitHub REST API, scoped to one repository.
#[derive(Debug)]
pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    repository_slug: String,
    owner: String,
    token: String,
    rate_limiter: RateLimiter,
}

impl GithubClient {
    /// Builds a client with the default one-second write spacing.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client can't be constructed.
    pub fn new(config: &GithubConfig) -> Result<Self, GithubError> {
        Self::with_rate_limiter(config, RateLimiter::default())
    }

    /// Builds a client with a custom minimum spacing between calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client can't be constructed.
    pub fn with_min_interval(
        config: &GithubConfig,
        interval: Duration,
    ) -> Result<Self, GithubError> {
        Self::with_rate_limiter(config, RateLimiter::new(interval))
    }

    fn with_rate_limiter(
        config: &GithubConfig,
        rate_limiter: RateLimiter,
    ) -> Result<Self, GithubError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("jira-github-migrator/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            repository_slug: config.repository_slug.clone(),
            owner: config.owner().to_string(),
            token: config.access_token.clone(),
            rate_limiter,
        })
    }

    /// API URL of an issue in the target repository.
    pub fn issue_url(&self, number: u64) -> String {
        self.repo_url(&format!("/issues/{number}"))
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}{}", self.api_url, self.repository_slug, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(AUTHORIZATION, format!("token {}", self.token))
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, GithubError> {
        self.rate_limiter.acquire().await;
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GithubError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }
        Ok(response)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<T, GithubError> {
        Ok(self.execute(request, url).await?.json().await?)
    }

    /// Deletes the target repository.
    ///
    /// # Errors
    ///
    /// Returns an error for any non-success status, including 404 when the
    /// repository doesn't exist (callers decide whether that matters).
    pub async fn delete_repository(&self) -> Result<(), GithubError> {
        info!(slug = %self.repository_slug, "Deleting repository");
        let url = self.repo_url("");
        self.execute(self.request(Method::DELETE, &url), &url)
            .await?;
        Ok(())
    }

    /// Creates the target repository as a private repository in its
    /// organization.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    pub async fn create_repository(&self) -> Result<(), GithubError> {
        info!(slug = %self.repository_slug, "Creating repository");
        let url = format!("{}/orgs/{}/repos", self.api_url, self.owner);
        let body = json!({
            "name": self.repository_slug.split('/').nth(1).unwrap_or(&self.repository_slug),
            "private": true,
        });
        self.execute(self.request(Method::POST, &url).json(&body), &url)
            .await?;
        Ok(())
    }

    /// Retrieves all milestones of the repository, paging through every
    /// state.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn retrieve_milestones(&self) -> Result<Vec<Milestone>, GithubError> {
        let mut milestones = Vec::new();
        for page in 1.. {
            let url = self.repo_url(&format!(
                "/milestones?state=all&per_page={PAGE_SIZE}&page={page}"
            ));
            let batch: Vec<Milestone> = self
                .execute_json(self.request(Method::GET, &url), &url)
                .await?;
            if batch.is_empty() {
                break;
            }
            milestones.extend(batch);
        }
        Ok(milestones)
    }

    /// Creates one milestone.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    pub async fn create_milestone(
        &self,
        title: &str,
        closed: bool,
        due_on: Option<DateTime<Utc>>,
    ) -> Result<(), GithubError> {
        debug!(title, "Creating milestone");
        let url = self.repo_url("/milestones");
        let mut body = json!({
            "title": title,
            "state": if closed { "closed" } else { "open" },
        });
        if let Some(due_on) = due_on {
            body["due_on"] = json!(super::model::github_datetime::format(&due_on));
        }
        self.execute(self.request(Method::POST, &url).json(&body), &url)
            .await?;
        Ok(())
    }

    /// Lists the names of all labels defined on the repository.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn list_label_names(&self) -> Result<Vec<String>, GithubError> {
        let mut names = Vec::new();
        for page in 1.. {
            let url = self.repo_url(&format!("/labels?per_page={PAGE_SIZE}&page={page}"));
            let batch: Vec<LabelSpec> = self
                .execute_json(self.request(Method::GET, &url), &url)
                .await?;
            if batch.is_empty() {
                break;
            }
            names.extend(batch.into_iter().map(|label| label.name));
        }
        Ok(names)
    }

    /// Creates one label.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    pub async fn create_label(&self, label: &LabelSpec) -> Result<(), GithubError> {
        debug!(name = %label.name, "Creating label");
        let url = self.repo_url("/labels");
        self.execute(self.request(Method::POST, &url).json(label), &url)
            .await?;
        Ok(())
    }

    /// Submits one asynchronous issue import and returns the opaque
    /// status-check handle.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, or a
    /// response body that doesn't decode into an import handle.
    pub async fn submit_import(&self, request: &ImportRequest) -> Result<ImportResponse, GithubError> {
        let url = self.repo_url("/import/issues");
        self.execute_json(
            self.request(Method::POST, &url)
                .header(ACCEPT, IMPORT_MEDIA_TYPE)
                .json(request),
            &url,
        )
        .await
    }

    /// Polls an import's status-check URL.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or non-success status.
    pub async fn import_status(&self, status_url: &str) -> Result<ImportStatus, GithubError> {
        self.execute_json(
            self.request(Method::GET, status_url)
                .header(ACCEPT, IMPORT_MEDIA_TYPE),
            status_url,
        )
        .await
    }

    /// Marks an issue closed as not planned. Best-effort metadata
    /// correction for issues resolved as declined/duplicate/irreproducible.
    ///
    /// # Errors
    ///
    /// Returns an error if the PATCH fails.
    pub async fn mark_not_planned(&self, issue_url: &str) -> Result<(), GithubError> {
        let body = json!({
            "state": "closed",
            "state_reason": "not_planned",
        });
        self.execute(
            self.request(Method::PATCH, issue_url)
                .header(ACCEPT, IMPORT_MEDIA_TYPE)
                .json(&body),
            issue_url,
        )
        .await?;
        Ok(())
    }

    /// Checks whether an issue exists in the target repository.
    ///
    /// # Errors
    ///
    /// Returns an error for any status other than success or 404.
    pub async fn issue_exists(&self, number: u64) -> Result<bool, GithubError> {
        let url = self.issue_url(number);
        match self.execute(self.request(Method::GET, &url), &url).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Lists the comments of an issue or pull request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn issue_comments(&self, number: u64) -> Result<Vec<IssueComment>, GithubError> {
        let url = self.repo_url(&format!("/issues/{number}/comments"));
        self.execute_json(self.request(Method::GET, &url), &url)
            .await
    }

    /// Creates a comment on an issue or pull request.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    pub async fn create_issue_comment(&self, number: u64, body: &str) -> Result<(), GithubError> {
        let url = self.repo_url(&format!("/issues/{number}/comments"));
        self.execute(
            self.request(Method::POST, &url)
                .json(&IssueComment { body: body.to_string() }),
            &url,
        )
        .await?;
        Ok(())
    }

    /// Fetches one page of the repository's issues, all states, oldest
    /// first. Used by the mapping-rebuild mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_issues_page(&self, page: u32) -> Result<Vec<RepoIssue>, GithubError> {
        let url = self.repo_url(&format!(
            "/issues?state=all&direction=asc&per_page={PAGE_SIZE}&page={page}"
        ));
        self.execute_json(self.request(Method::GET, &url), &url)
            .await
    }
}
