//! Typed migration settings.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Jira (source tracker) connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JiraConfig {
    /// Base URL of the Jira instance, e.g. `https://issues.apache.org/jira`.
    pub base_url: String,

    /// Project id whose issues are migrated, e.g. `MNG`.
    pub project_id: String,

    /// JQL query selecting the issues to migrate.
    pub migrate_jql: String,
}

impl JiraConfig {
    /// Browse URL for an issue key on this Jira instance.
    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }

    /// Profile URL for a Jira username on this instance.
    pub fn profile_url(&self, username: &str) -> String {
        format!("{}/secure/ViewProfile.jspa?name={}", self.base_url, username)
    }
}

/// GitHub (destination tracker) connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GithubConfig {
    /// GitHub REST API base URL. Overridable for tests.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Target repository in `owner/name` form.
    pub repository_slug: String,

    /// Personal access token used for all write calls.
    #[serde(default)]
    pub access_token: String,

    /// Delete and re-create the target repository at run start.
    ///
    /// Doubles as the test-mode switch: with this set, assignees are not
    /// applied, pull-request references are not rendered, and the
    /// pull-request linking phase is skipped, because those would generate
    /// events against real pull requests.
    #[serde(default)]
    pub delete_create_repository: bool,
}

pub(crate) fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

impl GithubConfig {
    /// Repository owner (the part before the slash).
    pub fn owner(&self) -> &str {
        self.repository_slug
            .split_once('/')
            .map_or(self.repository_slug.as_str(), |(owner, _)| owner)
    }

    /// Repository name (the part after the slash).
    pub fn repository(&self) -> &str {
        self.repository_slug
            .split_once('/')
            .map_or(self.repository_slug.as_str(), |(_, name)| name)
    }

    /// Whether the run operates in non-destructive test mode.
    pub fn test_mode(&self) -> bool {
        self.delete_create_repository
    }
}

/// Markup conversion settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MarkupConfig {
    /// Issues created before this date use the wiki-markup conversion
    /// rules; later issues only get markdown escaping.
    pub cutoff_date: DateTime<Utc>,
}

/// Complete migration settings loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MigrationConfig {
    pub jira: JiraConfig,

    pub github: GithubConfig,

    pub markup: MarkupConfig,

    /// Static Jira user key to GitHub username table, used for assignees.
    #[serde(default)]
    pub users: HashMap<String, String>,
}
