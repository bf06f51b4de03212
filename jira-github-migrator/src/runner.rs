//! Orchestrates a full migration run.

use crate::config::{ConfigError, MigrationConfig};
use crate::github::{GithubClient, GithubError, ImportRequest, MilestoneIndex};
use crate::jira::{JiraClient, JiraError, JiraIssue, JiraProject, JiraUser};
use crate::markup::MarkupManager;
use crate::migration::{
    collect_backports, holder_request, reconcile_pending, ContextError, ImportBuilder,
    ImportEngine, IssueProcessor, MigrationContext, MigrationRules, SubmittedImport,
    IMPORT_BATCH_SIZE,
};
use crate::rate_limit::DEFAULT_MIN_INTERVAL;
use crate::summary::{ProcessingOutcome, RunSummary};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuration for running the migration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// The loaded migration settings.
    settings: MigrationConfig,
    /// Directory holding the three state files.
    state_dir: PathBuf,
    /// Minimum spacing between destination calls.
    min_call_interval: Duration,
}

impl RunnerConfig {
    /// Creates a configuration with state files in the working directory
    /// and the default one-second write spacing.
    pub fn new(settings: MigrationConfig) -> Self {
        Self {
            settings,
            state_dir: PathBuf::from("."),
            min_call_interval: DEFAULT_MIN_INTERVAL,
        }
    }

    /// Sets the directory holding the state files.
    pub fn with_state_dir(mut self, state_dir: PathBuf) -> Self {
        self.state_dir = state_dir;
        self
    }

    /// Sets the minimum spacing between destination calls.
    pub fn with_min_call_interval(mut self, interval: Duration) -> Self {
        self.min_call_interval = interval;
        self
    }

    /// Returns the loaded settings.
    pub fn settings(&self) -> &MigrationConfig {
        &self.settings
    }

    /// Returns the state file directory.
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }
}

/// Errors that abort a run before or during orchestration.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Settings loading and validation errors.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// State file errors.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Source read API errors.
    #[error(transparent)]
    Jira(#[from] JiraError),

    /// Destination write API errors outside the per-item recovery paths.
    #[error(transparent)]
    Github(#[from] GithubError),

    /// The repository was deleted for a fresh test-mode run, but mapping
    /// files from an earlier run still have content: a misconfigured
    /// resume. Aborts before any import traffic.
    #[error(
        "Repository was deleted but github-issue-mappings.properties or \
         github-issue-pending.properties have content. Please delete the files, \
         or save the content elsewhere and then delete."
    )]
    StaleMappingFiles,
}

/// Orchestrates a complete migration run.
pub struct Runner {
    config: RunnerConfig,
    rules: MigrationRules,
    jira: JiraClient,
    github: GithubClient,
    markup: MarkupManager,
}

impl Runner {
    /// Builds a runner from the provided configuration and rule set.
    ///
    /// # Errors
    ///
    /// Returns an error if either API client can't be constructed.
    pub fn new(config: RunnerConfig, rules: MigrationRules) -> Result<Self, RunnerError> {
        let jira = JiraClient::new(&config.settings.jira.base_url)?;
        let github =
            GithubClient::with_min_interval(&config.settings.github, config.min_call_interval)?;
        let markup = MarkupManager::new(config.settings.markup.cutoff_date);
        Ok(Self {
            config,
            rules,
            jira,
            github,
            markup,
        })
    }

    /// Executes the full migration flow.
    ///
    /// # Errors
    ///
    /// Returns an error only for run-level structural failures; per-item
    /// failures are recovered, recorded, and reflected in the summary.
    pub async fn run(&mut self) -> Result<RunSummary, RunnerError> {
        let test_mode = self.config.settings.github.test_mode();
        let mut summary = RunSummary::new(test_mode);
        let mut context = MigrationContext::open(&self.config.state_dir)?;

        if test_mode {
            match self.github.delete_repository().await {
                Ok(()) => {
                    // The repository is fresh now; stale mappings would
                    // silently skip every issue.
                    if !context.completed().is_empty() || !context.pending().is_empty() {
                        return Err(RunnerError::StaleMappingFiles);
                    }
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
            self.github.create_repository().await?;
        }

        let fresh_start = context.completed().is_empty() && context.pending().is_empty();

        let project = self
            .jira
            .find_project(&self.config.settings.jira.project_id)
            .await?;
        let issues = self
            .jira
            .find_issues_with_votes_and_commits(&self.config.settings.jira.migrate_jql)
            .await?;

        let restricted_keys: Vec<String> = issues
            .iter()
            .filter(|issue| !issue.fields.is_public())
            .map(|issue| issue.key.clone())
            .collect();
        let public_issues: Vec<JiraIssue> = issues
            .into_iter()
            .filter(|issue| issue.fields.is_public())
            .collect();
        debug!(
            public = public_issues.len(),
            restricted = restricted_keys.len(),
            "Partitioned issues by visibility"
        );

        info!("Collecting list of users from all issues");
        self.markup
            .configure_user_lookup(&collect_users(&public_issues));

        reconcile_pending(&self.github, &mut context, &public_issues, &mut summary).await;

        if fresh_start {
            self.create_milestones(&project).await?;
            self.create_labels().await?;
        } else {
            // Restart after failure: milestones and labels exist already.
            info!("Existing mappings found, skipping milestone and label creation");
        }

        info!("Retrieving list of milestones");
        let milestones = MilestoneIndex::new(self.github.retrieve_milestones().await?);

        let (work, _remaining): (Vec<JiraIssue>, Vec<JiraIssue>) =
            public_issues.into_iter().partition(|issue| {
                !context.is_known(&issue.key) && self.rules.issue_filter.accept(issue)
            });

        info!(
            count = work.len(),
            "Preparing for import (wiki to markdown, select labels, format Jira details, etc)"
        );
        let builder = ImportBuilder::new(
            &self.config.settings.jira,
            &self.config.settings.github,
            &self.config.settings.users,
            &self.markup,
            self.rules.label_handler.as_ref(),
            &milestones,
            &restricted_keys,
        );
        let mut prepared: Vec<(JiraIssue, ImportRequest)> = Vec::with_capacity(work.len());
        for mut issue in work {
            self.rules.issue_processor.before_conversion(&mut issue);
            match builder.build(&issue) {
                Ok(mut request) => {
                    self.rules.issue_processor.before_import(&issue, &mut request);
                    prepared.push((issue, request));
                }
                Err(e) => {
                    warn!(key = %issue.key, error = %e, "Skipping structurally invalid issue");
                    summary.record(&ProcessingOutcome::Skipped {
                        key: issue.key.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            count = prepared.len(),
            "Starting to import issues (2 requests per issue/iteration)"
        );
        let engine = ImportEngine::new(&self.github);
        let mut submitted: Vec<SubmittedImport> = Vec::with_capacity(prepared.len());
        for (index, (issue, request)) in prepared.iter().enumerate() {
            let resolution = issue.fields.resolution.as_ref().map(|r| r.name.as_str());
            submitted.push(
                engine
                    .submit_issue(&issue.key, resolution, request, &mut context)
                    .await,
            );
            // Verify in batches so failures surface before the whole list
            // is submitted; the final pass below reaches the same state.
            if index % IMPORT_BATCH_SIZE == 0 && index != 0 {
                for checked in (index - IMPORT_BATCH_SIZE)..=index {
                    if !engine.verify(&mut submitted[checked], &mut context).await {
                        error!(key = %prepared[checked].0.key, "Detected import failure");
                        break;
                    }
                }
            }
        }
        info!("Checking remaining import results");
        for item in &mut submitted {
            engine.verify(item, &mut context).await;
        }
        for item in &submitted {
            summary.record(&item.outcome());
        }

        let failed = context.failed_import_count();
        if failed > 0 {
            let total = submitted.len();
            error!(
                failed,
                succeeded = total.saturating_sub(failed),
                total,
                "Import failures detected, skipping pull-request linking and backports"
            );
            info!(context = %context, "Migration run completed");
            return Ok(summary);
        }
        info!("0 failures");

        if !test_mode {
            // Linking pull requests triggers timeline events; never during
            // test runs.
            info!("Linking pull requests");
            for item in &submitted {
                if let Some(number) = item.issue_number() {
                    engine
                        .link_pull_requests(number, item.title(), item.pull_requests(), &mut context)
                        .await;
                }
            }
        }

        let backport_groups =
            collect_backports(prepared.iter().map(|(issue, _)| issue), &milestones);
        info!(count = backport_groups.len(), "Backport issue holders to create");
        if !backport_groups.is_empty() {
            let mut holders: Vec<SubmittedImport> = Vec::with_capacity(backport_groups.len());
            for group in &backport_groups {
                let request = holder_request(group, &mut context, &self.markup);
                holders.push(
                    engine
                        .submit_holder(&group.milestone.title, &request, &mut context)
                        .await,
                );
            }
            info!("Checking import results for backport issue holders");
            for holder in &mut holders {
                engine.verify(holder, &mut context).await;
            }
            for holder in &holders {
                summary.record(&holder.outcome());
            }
        }

        info!(context = %context, "Migration run completed");
        Ok(summary)
    }

    async fn create_milestones(&self, project: &JiraProject) -> Result<(), RunnerError> {
        let existing: BTreeSet<String> = self
            .github
            .retrieve_milestones()
            .await?
            .into_iter()
            .map(|m| m.title)
            .collect();
        let versions: Vec<_> = project
            .versions
            .iter()
            .filter(|version| self.rules.milestone_filter.accept(version))
            .filter(|version| !existing.contains(&version.name))
            .collect();
        info!(count = versions.len(), "Creating milestones");
        for version in versions {
            let due_on = version
                .release_date
                .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc());
            self.github
                .create_milestone(&version.name, version.released, due_on)
                .await?;
        }
        Ok(())
    }

    async fn create_labels(&self) -> Result<(), RunnerError> {
        let existing = self.github.list_label_names().await?;
        let new_labels: Vec<_> = self
            .rules
            .label_handler
            .all_labels()
            .into_iter()
            .filter(|label| !existing.contains(&label.name))
            .collect();
        info!(count = new_labels.len(), "Creating labels");
        for label in &new_labels {
            self.github.create_label(label).await?;
        }
        Ok(())
    }
}

/// Collects the users referenced from issues, for mention resolution.
fn collect_users(issues: &[JiraIssue]) -> HashMap<String, JiraUser> {
    let mut users = HashMap::new();
    for issue in issues {
        if let Some(reporter) = issue.fields.reporter.as_ref() {
            users.insert(reporter.id().to_string(), reporter.clone());
        }
        for comment in &issue.fields.comment.comments {
            if let Some(author) = comment.author.as_ref() {
                users.insert(author.id().to_string(), author.clone());
            }
        }
    }
    users
}
