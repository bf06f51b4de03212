//! Integration tests driving the import engine and the full runner against
//! mock Jira and GitHub servers.

use chrono::{TimeZone, Utc};
use jira_github_migrator::config::MarkupConfig;
use jira_github_migrator::migration::{
    CompositeIssueFilter, CompositeIssueProcessor, ImportEngine, LabelHandler, MigrationContext,
    MigrationRules, MAX_POLL_RETRIES, PENDING_FILE,
};
use jira_github_migrator::{
    GithubClient, GithubConfig, ImportRequest, JiraConfig, MigrationConfig, Runner, RunnerConfig,
    RunnerError, MAPPINGS_FILE,
};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FAILURES_FILE: &str = jira_github_migrator::FAILURES_FILE;

struct NoLabels;

impl LabelHandler for NoLabels {
    fn labels_for(&self, _issue: &jira_github_migrator::JiraIssue) -> Vec<String> {
        Vec::new()
    }
    fn all_labels(&self) -> Vec<jira_github_migrator::github::LabelSpec> {
        Vec::new()
    }
}

fn test_rules() -> MigrationRules {
    MigrationRules {
        issue_filter: CompositeIssueFilter::default(),
        milestone_filter: Box::new(|_: &jira_github_migrator::jira::JiraVersion| true),
        label_handler: Box::new(NoLabels),
        issue_processor: CompositeIssueProcessor::default(),
    }
}

fn settings(jira_url: &str, github_url: &str) -> MigrationConfig {
    MigrationConfig {
        jira: JiraConfig {
            base_url: jira_url.to_string(),
            project_id: "MNG".to_string(),
            migrate_jql: "project = MNG ORDER BY key ASC".to_string(),
        },
        github: GithubConfig {
            api_url: github_url.to_string(),
            repository_slug: "acme/maven".to_string(),
            access_token: "test-token".to_string(),
            delete_create_repository: false,
        },
        markup: MarkupConfig {
            cutoff_date: Utc.with_ymd_and_hms(2010, 6, 1, 0, 0, 0).unwrap(),
        },
        users: HashMap::new(),
    }
}

fn runner_config(settings: MigrationConfig, state_dir: &Path) -> RunnerConfig {
    RunnerConfig::new(settings)
        .with_state_dir(state_dir.to_path_buf())
        .with_min_call_interval(Duration::from_millis(1))
}

fn jira_issue(key: &str, summary: Option<&str>, resolution: Option<&str>) -> serde_json::Value {
    let mut fields = json!({
        "created": "2013-05-21T10:21:14.000+0000",
        "updated": "2013-06-01T08:00:00.000+0000",
        "reporter": {"key": "jsmith", "name": "jsmith", "displayName": "Jane Smith"},
    });
    if let Some(summary) = summary {
        fields["summary"] = json!(summary);
    }
    if let Some(resolution) = resolution {
        fields["resolution"] = json!({"name": resolution});
    }
    json!({"key": key, "fields": fields})
}

async fn mount_jira(server: &MockServer, issues: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/rest/api/2/project/MNG"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"key": "MNG", "versions": []})),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "startAt": 0,
            "maxResults": 100,
            "total": issues.len(),
            "issues": issues,
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/rest/api/2/issue/[A-Z0-9-]+/remotelink$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

async fn mount_empty_milestones_and_labels(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/repos/acme/maven/milestones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/maven/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

/// One issue imports and closes, one times out after the poll budget, one
/// is structurally invalid and never reaches the network.
#[tokio::test]
async fn end_to_end_three_issue_scenario() {
    let jira = MockServer::start().await;
    let github = MockServer::start().await;
    let state = TempDir::new().unwrap();

    mount_jira(
        &jira,
        vec![
            jira_issue("MNG-1", Some("Fixed issue"), Some("Fixed")),
            jira_issue("MNG-2", Some("Slow issue"), None),
            jira_issue("MNG-3", None, None),
        ],
    )
    .await;
    mount_empty_milestones_and_labels(&github).await;

    // MNG-1: import settles immediately; the closed flag derives from the
    // resolution being present.
    Mock::given(method("POST"))
        .and(path("/repos/acme/maven/import/issues"))
        .and(body_partial_json(json!({"issue": {"title": "[MNG-1] Fixed issue"}})))
        .and(body_partial_json(json!({"issue": {"closed": true}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": format!("{}/repos/acme/maven/import/issues/1", github.uri()),
            "status": "imported",
        })))
        .expect(1)
        .mount(&github)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/maven/import/issues/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "imported",
            "issue_url": format!("{}/repos/acme/maven/issues/11", github.uri()),
        })))
        .expect(1)
        .mount(&github)
        .await;

    // MNG-2: accepted but never settles; the poll budget classifies it as
    // failed.
    Mock::given(method("POST"))
        .and(path("/repos/acme/maven/import/issues"))
        .and(body_partial_json(json!({"issue": {"title": "[MNG-2] Slow issue"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": format!("{}/repos/acme/maven/import/issues/2", github.uri()),
            "status": "pending",
        })))
        .expect(1)
        .mount(&github)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/maven/import/issues/2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "pending"})),
        )
        .expect(u64::from(MAX_POLL_RETRIES))
        .mount(&github)
        .await;

    // "Fixed" is not in the not-planned vocabulary: no close-reason PATCH.
    Mock::given(method("PATCH"))
        .and(path_regex(r"^/repos/acme/maven/issues/\d+$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&github)
        .await;

    let config = runner_config(settings(&jira.uri(), &github.uri()), state.path());
    let mut runner = Runner::new(config, test_rules()).unwrap();
    let summary = runner.run().await.unwrap();

    assert_eq!(summary.issues_imported, 1);
    assert_eq!(summary.issues_failed, 1);
    assert_eq!(summary.issues_skipped, 1);
    assert_eq!(summary.issues_pending, 0);
    assert!(summary.has_failures());

    let mappings = std::fs::read_to_string(state.path().join(MAPPINGS_FILE)).unwrap();
    assert_eq!(mappings, "MNG-1:11\n");
    let pending = std::fs::read_to_string(state.path().join(PENDING_FILE)).unwrap();
    assert_eq!(pending, "");
    let failures = std::fs::read_to_string(state.path().join(FAILURES_FILE)).unwrap();
    assert!(failures.contains(&format!("=> MNG-2 [failed after {MAX_POLL_RETRIES} retries]")));
    assert!(!failures.contains("MNG-3"));
}

/// A poll sequence of pending, pending, imported succeeds because the
/// budget isn't exhausted; the key lands in the pending table because the
/// submit response itself reported pending.
#[tokio::test]
async fn pending_polls_below_the_budget_succeed() {
    let github = MockServer::start().await;
    let state = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/repos/acme/maven/import/issues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": format!("{}/repos/acme/maven/import/issues/7", github.uri()),
            "status": "pending",
        })))
        .expect(1)
        .mount(&github)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/maven/import/issues/7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "pending"})),
        )
        .up_to_n_times(2)
        .mount(&github)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/maven/import/issues/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "imported",
            "issue_url": format!("{}/repos/acme/maven/issues/21", github.uri()),
        })))
        .expect(1)
        .mount(&github)
        .await;

    let config = settings("http://unused.invalid", &github.uri());
    let client =
        GithubClient::with_min_interval(&config.github, Duration::from_millis(1)).unwrap();
    let engine = ImportEngine::new(&client);
    let mut context = MigrationContext::open(state.path()).unwrap();

    let mut request = ImportRequest::default();
    request.issue.title = "[MNG-9] Eventually settles".to_string();

    let mut submitted = engine
        .submit_issue("MNG-9", None, &request, &mut context)
        .await;
    assert!(engine.verify(&mut submitted, &mut context).await);
    assert_eq!(submitted.issue_number(), Some(21));
    assert_eq!(context.pending_issue_number("MNG-9"), Some(21));
    assert_eq!(context.github_issue_number("MNG-9"), None);
}

/// Not-planned resolutions trigger the close-reason PATCH; others don't.
#[tokio::test]
async fn not_planned_resolution_patches_the_close_reason() {
    let github = MockServer::start().await;
    let state = TempDir::new().unwrap();

    for (import_id, issue_number) in [(1, 31), (2, 32)] {
        Mock::given(method("POST"))
            .and(path("/repos/acme/maven/import/issues"))
            .and(body_partial_json(
                json!({"issue": {"title": format!("[MNG-{import_id}] x")}}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "url": format!("{}/repos/acme/maven/import/issues/{import_id}", github.uri()),
                "status": "pending",
            })))
            .mount(&github)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/repos/acme/maven/import/issues/{import_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "imported",
                "issue_url": format!("{}/repos/acme/maven/issues/{issue_number}", github.uri()),
            })))
            .mount(&github)
            .await;
    }
    Mock::given(method("PATCH"))
        .and(path("/repos/acme/maven/issues/31"))
        .and(body_partial_json(json!({"state": "closed", "state_reason": "not_planned"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&github)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/repos/acme/maven/issues/32"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&github)
        .await;

    let config = settings("http://unused.invalid", &github.uri());
    let client =
        GithubClient::with_min_interval(&config.github, Duration::from_millis(1)).unwrap();
    let engine = ImportEngine::new(&client);
    let mut context = MigrationContext::open(state.path()).unwrap();

    let mut request = ImportRequest::default();
    request.issue.title = "[MNG-1] x".to_string();
    let mut cannot_reproduce = engine
        .submit_issue("MNG-1", Some("Cannot Reproduce"), &request, &mut context)
        .await;
    assert!(engine.verify(&mut cannot_reproduce, &mut context).await);

    let mut request = ImportRequest::default();
    request.issue.title = "[MNG-2] x".to_string();
    let mut fixed = engine
        .submit_issue("MNG-2", Some("Fixed"), &request, &mut context)
        .await;
    assert!(engine.verify(&mut fixed, &mut context).await);
}

/// Running to completion and re-running against an unchanged source
/// submits zero new imports; the second run only reconciles the pending
/// key into the completed table.
#[tokio::test]
async fn resume_is_idempotent_and_reconciles_pending_keys() {
    let jira = MockServer::start().await;
    let github = MockServer::start().await;
    let state = TempDir::new().unwrap();

    mount_jira(&jira, vec![jira_issue("MNG-1", Some("One issue"), None)]).await;
    mount_empty_milestones_and_labels(&github).await;

    // Exactly one import POST across both runs.
    Mock::given(method("POST"))
        .and(path("/repos/acme/maven/import/issues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": format!("{}/repos/acme/maven/import/issues/1", github.uri()),
            "status": "pending",
        })))
        .expect(1)
        .mount(&github)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/maven/import/issues/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "imported",
            "issue_url": format!("{}/repos/acme/maven/issues/11", github.uri()),
        })))
        .mount(&github)
        .await;
    // The reconciler's existence probe in the second run.
    Mock::given(method("GET"))
        .and(path("/repos/acme/maven/issues/11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"number": 11})))
        .mount(&github)
        .await;

    let first_config = runner_config(settings(&jira.uri(), &github.uri()), state.path());
    let mut first_runner = Runner::new(first_config, test_rules()).unwrap();
    let first = first_runner.run().await.unwrap();

    assert_eq!(first.issues_pending, 1);
    assert!(!first.has_failures());
    let pending = std::fs::read_to_string(state.path().join(PENDING_FILE)).unwrap();
    assert_eq!(pending, "MNG-1:11\n");

    let second_config = runner_config(settings(&jira.uri(), &github.uri()), state.path());
    let mut second_runner = Runner::new(second_config, test_rules()).unwrap();
    let second = second_runner.run().await.unwrap();

    assert_eq!(second.issues_promoted, 1);
    assert_eq!(second.issues_processed(), 0);
    assert!(!second.has_failures());

    let mappings = std::fs::read_to_string(state.path().join(MAPPINGS_FILE)).unwrap();
    assert_eq!(mappings, "MNG-1:11\n");
    let pending = std::fs::read_to_string(state.path().join(PENDING_FILE)).unwrap();
    assert_eq!(pending, "");
}

/// A pending key whose destination issue still doesn't exist stays
/// pending and is never re-submitted.
#[tokio::test]
async fn unconfirmed_pending_keys_stay_pending() {
    let jira = MockServer::start().await;
    let github = MockServer::start().await;
    let state = TempDir::new().unwrap();

    std::fs::write(state.path().join(PENDING_FILE), "MNG-1:11\n").unwrap();

    mount_jira(&jira, vec![jira_issue("MNG-1", Some("One issue"), None)]).await;
    mount_empty_milestones_and_labels(&github).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/maven/issues/11"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&github)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/maven/import/issues"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&github)
        .await;

    let config = runner_config(settings(&jira.uri(), &github.uri()), state.path());
    let mut runner = Runner::new(config, test_rules()).unwrap();
    let summary = runner.run().await.unwrap();

    assert_eq!(summary.issues_still_pending, 1);
    assert_eq!(summary.issues_processed(), 0);

    let pending = std::fs::read_to_string(state.path().join(PENDING_FILE)).unwrap();
    assert_eq!(pending, "MNG-1:11\n");
}

/// A freshly deleted repository combined with non-empty mapping files is a
/// misconfigured resume and aborts before any import traffic.
#[tokio::test]
async fn stale_mappings_with_a_fresh_repository_abort_the_run() {
    let jira = MockServer::start().await;
    let github = MockServer::start().await;
    let state = TempDir::new().unwrap();

    std::fs::write(state.path().join(MAPPINGS_FILE), "MNG-1:11\n").unwrap();

    Mock::given(method("DELETE"))
        .and(path("/repos/acme/maven"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&github)
        .await;
    Mock::given(method("POST"))
        .and(path("/orgs/acme/repos"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&github)
        .await;

    let mut test_settings = settings(&jira.uri(), &github.uri());
    test_settings.github.delete_create_repository = true;

    let config = runner_config(test_settings, state.path());
    let mut runner = Runner::new(config, test_rules()).unwrap();
    let result = runner.run().await;

    assert!(matches!(result, Err(RunnerError::StaleMappingFiles)));
}
