#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

pub mod config;
pub mod github;
pub mod jira;
pub mod markup;
pub mod migration;
pub mod rate_limit;
pub mod runner;
pub mod summary;

pub use config::{load_config, ConfigError, GithubConfig, JiraConfig, MigrationConfig};
pub use github::{GithubClient, GithubError, ImportRequest, MilestoneIndex};
pub use jira::{JiraClient, JiraError, JiraIssue, JiraProject};
pub use markup::{Markup, MarkupManager};
pub use migration::{
    default_rules, ImportBuilder, ImportEngine, MigrationContext, MigrationRules,
    FAILURES_FILE, MAPPINGS_FILE, PENDING_FILE,
};
pub use rate_limit::RateLimiter;
pub use runner::{Runner, RunnerConfig, RunnerError};
pub use summary::{ProcessingOutcome, RunSummary};
