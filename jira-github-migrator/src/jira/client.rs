//! Jira read client.
//!
//! Read-only access to the source tracker. Queries are idempotent and
//! restartable; no rate limiting applies on this side.

use super::error::JiraError;
use super::model::{JiraIssue, JiraProject, RemoteLinkResource, SearchPage};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

const SEARCH_PAGE_SIZE: u64 = 100;

/// Issue fields requested from the search API.
const SEARCH_FIELDS: &str = "summary,description,reporter,assignee,created,updated,resolution,\
                             issuetype,priority,versions,fixVersions,comment,issuelinks,\
                             attachment,subtasks,parent,watches,votes,security,\
                             customfield_10600,customfield_10684";

/// Client for the Jira REST API.
#[derive(Debug)]
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
}

impl JiraClient {
    /// Builds a client for the Jira instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client can't be constructed.
    pub fn new(base_url: &str) -> Result<Self, JiraError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("jira-github-migrator/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, JiraError> {
        let url = format!("{}/rest/api/2{}", self.base_url, path);
        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JiraError::Status {
                status: status.as_u16(),
                url,
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Fetches a project with its version list.
    ///
    /// # Errors
    ///
    /// Returns an error if the project can't be retrieved.
    pub async fn find_project(&self, project_id: &str) -> Result<JiraProject, JiraError> {
        info!(project = project_id, "Retrieving Jira project");
        self.get(&format!("/project/{project_id}"), &[]).await
    }

    /// Runs a JQL search and resolves remote links for every issue.
    ///
    /// # Errors
    ///
    /// Returns an error if any page or remote-link request fails.
    pub async fn find_issues(&self, jql: &str) -> Result<Vec<JiraIssue>, JiraError> {
        let mut issues = Vec::new();
        let mut start_at = 0;
        loop {
            let page: SearchPage = self
                .get(
                    "/search",
                    &[
                        ("jql", jql),
                        ("startAt", &start_at.to_string()),
                        ("maxResults", &SEARCH_PAGE_SIZE.to_string()),
                        ("fields", SEARCH_FIELDS),
                    ],
                )
                .await?;
            debug!(
                start_at = page.start_at,
                total = page.total,
                count = page.issues.len(),
                "Fetched search page"
            );
            start_at = page.start_at + page.issues.len() as u64;
            let done = page.issues.is_empty() || start_at >= page.total;
            issues.extend(page.issues);
            if done {
                break;
            }
        }

        for issue in &mut issues {
            let links: Vec<RemoteLinkResource> = self
                .get(&format!("/issue/{}/remotelink", issue.key), &[])
                .await?;
            issue.remote_links = links.into_iter().map(|l| l.object).collect();
        }

        info!(count = issues.len(), "Fetched Jira issues");
        Ok(issues)
    }

    /// Like [`find_issues`](Self::find_issues), additionally resolving the
    /// commit URLs referenced from each issue's remote links.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying search fails.
    pub async fn find_issues_with_votes_and_commits(
        &self,
        jql: &str,
    ) -> Result<Vec<JiraIssue>, JiraError> {
        let mut issues = self.find_issues(jql).await?;
        for issue in &mut issues {
            issue.commit_urls = issue
                .remote_links
                .iter()
                .filter(|link| link.url.contains("/commit"))
                .map(|link| link.url.clone())
                .collect();
        }
        Ok(issues)
    }
}
