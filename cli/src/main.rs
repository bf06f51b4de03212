//! CLI for the Jira to GitHub issue migration.
//!
//! The default mode performs a full, resumable migration run. The
//! `rebuild-mapping` subcommand regenerates the mappings file from issue
//! titles already present in the destination repository.

use clap::{Parser, Subcommand};
use jira_github_migrator::{
    default_rules, load_config, GithubClient, RunSummary, Runner, RunnerConfig, RunnerError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Jira to GitHub migrator - copy a Jira project's issues into a GitHub
/// repository through the asynchronous import API.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the migration settings file.
    #[arg(long, default_value = "migration.toml")]
    config: PathBuf,

    /// GitHub Personal Access Token; overrides the settings file.
    #[arg(long, env = "GITHUB_TOKEN")]
    token: Option<String>,

    /// Directory holding the mapping, pending and failures files.
    #[arg(long, default_value = ".")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the mappings file by scanning destination issue titles for
    /// an embedded source key.
    RebuildMapping {
        /// File the rebuilt mappings are written to.
        #[arg(long, default_value = "github-issue-mappings.properties")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    init_tracing();

    // Parse arguments
    let args = Args::parse();

    match args.command {
        Some(Command::RebuildMapping { ref output }) => {
            let output = output.clone();
            match rebuild_mapping(&args, &output).await {
                Ok(count) => {
                    info!(count, output = %output.display(), "Mapping file rebuilt");
                    ExitCode::from(0)
                }
                Err(e) => {
                    error!(error = %e, "Mapping rebuild failed");
                    ExitCode::from(2)
                }
            }
        }
        None => match run(args).await {
            Ok(summary) => {
                print_summary(&summary);

                if summary.has_failures() {
                    ExitCode::from(1)
                } else {
                    ExitCode::from(0)
                }
            }
            Err(e) => {
                error!(error = %e, "Critical failure");
                ExitCode::from(2)
            }
        },
    }
}

/// Initializes tracing with environment filter support.
///
/// Sets up the global tracing subscriber with:
/// - Compact log formatting (single-line output)
/// - Log level filtering via `RUST_LOG` env var (defaults to "info")
fn init_tracing() {
    tracing_subscriber::registry()
        // Use compact formatting without module target paths for cleaner output
        .with(fmt::layer().compact().with_target(false))
        // Allow runtime log filtering via RUST_LOG env var (e.g., RUST_LOG=debug)
        // Falls back to "info" level if RUST_LOG is not set or invalid
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        // Register as the global default subscriber
        .init();
}

/// Main migration logic.
async fn run(args: Args) -> Result<RunSummary, RunnerError> {
    let mut settings = load_config(&args.config)?;
    if let Some(token) = args.token {
        settings.github.access_token = token;
    }
    let config = RunnerConfig::new(settings).with_state_dir(args.state_dir);
    let mut runner = Runner::new(config, default_rules())?;
    runner.run().await
}

/// Scans every destination issue and regenerates `KEY:NUMBER` mapping
/// lines from titles shaped like `[KEY] summary`. Kept entirely separate
/// from the migration engine.
async fn rebuild_mapping(
    args: &Args,
    output: &std::path::Path,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut settings = load_config(&args.config)?;
    if let Some(token) = args.token.as_ref() {
        settings.github.access_token = token.clone();
    }
    let github = GithubClient::new(&settings.github)?;
    let project_id = &settings.jira.project_id;

    let mut mappings = Vec::new();
    for page in 1.. {
        let issues = github.list_issues_page(page).await?;
        info!(page, count = issues.len(), "Scanned issues page");
        if issues.is_empty() {
            break;
        }
        for issue in issues {
            if issue.is_pull_request() {
                continue;
            }
            if let Some(key) = extract_source_key(&issue.title, project_id) {
                mappings.push(format!("{key}:{}", issue.number));
            }
        }
    }

    let count = mappings.len();
    mappings.push(String::new()); // trailing newline
    std::fs::write(output, mappings.join("\n"))?;
    Ok(count)
}

/// Extracts the source key from a title shaped like `[KEY] summary`.
fn extract_source_key(title: &str, project_id: &str) -> Option<String> {
    if !title.contains(&format!("[{project_id}")) {
        return None;
    }
    let start = title.find('[')? + 1;
    let end = title.find(']')?;
    (start < end).then(|| title[start..end].to_string())
}

/// Prints the final run summary.
fn print_summary(summary: &RunSummary) {
    println!("\nSummary:");
    println!(
        "  Mode: {}",
        if summary.test_mode { "Test" } else { "Live" }
    );
    println!("  Issues imported: {}", summary.issues_imported);
    println!("  Issues pending: {}", summary.issues_pending);
    println!("  Issues failed: {}", summary.issues_failed);
    println!("  Issues skipped: {}", summary.issues_skipped);
    println!("  Pending issues promoted: {}", summary.issues_promoted);
    println!(
        "  Pending issues unresolved: {}",
        summary.issues_still_pending
    );
    println!(
        "  Backport holders created: {}",
        summary.backport_holders_created
    );
    println!(
        "  Backport holders failed: {}",
        summary.backport_holders_failed
    );
}
