//! Durable source-key to destination-number mapping.
//!
//! Three line-oriented state files carry all cross-run continuity: the
//! completed mappings, the pending mappings, and a free-text failures log.
//! The in-memory maps are a cache; the files are ground truth for the next
//! run. Every record is flushed and synced before the call returns, so a
//! crash directly after a successful submission never loses that fact.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{error, warn};

/// Completed mappings, one `KEY:NUMBER` per line.
pub const MAPPINGS_FILE: &str = "github-issue-mappings.properties";
/// Accepted-but-unconfirmed mappings, one `KEY:NUMBER` per line.
pub const PENDING_FILE: &str = "github-issue-pending.properties";
/// Append-only diagnostics, with a banner per run.
pub const FAILURES_FILE: &str = "github-migration-failures.txt";

/// Errors raised while opening or loading the state files.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Failed to open state file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The mapping store for one run.
///
/// Invariant: a source key is present in at most one of the completed and
/// pending tables; the only legal transition is pending to completed, via
/// [`promote`](Self::promote).
pub struct MigrationContext {
    completed: BTreeMap<String, u64>,
    pending: BTreeMap<String, u64>,
    mappings_writer: File,
    pending_writer: File,
    failures_writer: File,
    failed_import_count: usize,
    backport_holder_count: usize,
}

impl MigrationContext {
    /// Opens the three state files in `state_dir`, loading prior mappings.
    ///
    /// The pending file is truncated after being read: a pending entry is
    /// only meaningful relative to the run that recorded it until it is
    /// confirmed, so this run re-derives its own pending set. A run-start
    /// banner is appended to the failures file.
    ///
    /// # Errors
    ///
    /// Returns an error if a state file can't be read or created.
    pub fn open(state_dir: &Path) -> Result<Self, ContextError> {
        let mappings_path = state_dir.join(MAPPINGS_FILE);
        let pending_path = state_dir.join(PENDING_FILE);
        let failures_path = state_dir.join(FAILURES_FILE);

        let completed = load_mappings(&mappings_path)?;
        let mut pending = load_mappings(&pending_path)?;
        for key in completed.keys() {
            if pending.remove(key).is_some() {
                warn!(key, "Key present in both mapping files, treating as completed");
            }
        }

        let mappings_writer = open_append(&mappings_path)?;
        let failures_writer = open_append(&failures_path)?;
        let pending_writer = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&pending_path)
            .map_err(|e| ContextError::Io {
                path: pending_path.display().to_string(),
                source: e,
            })?;

        let mut context = Self {
            completed,
            pending,
            mappings_writer,
            pending_writer,
            failures_writer,
            failed_import_count: 0,
            backport_holder_count: 0,
        };
        let started = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        context.write_failures_line(&format!("==================================\n{started}"));
        Ok(context)
    }

    /// Previously confirmed mappings.
    pub fn completed(&self) -> &BTreeMap<String, u64> {
        &self.completed
    }

    /// Mappings accepted by the destination but not yet confirmed.
    pub fn pending(&self) -> &BTreeMap<String, u64> {
        &self.pending
    }

    /// Whether a key is already mapped in either table. Keys for which this
    /// returns true are excluded from the work list before any transform or
    /// network call.
    pub fn is_known(&self, key: &str) -> bool {
        self.completed.contains_key(key) || self.pending.contains_key(key)
    }

    /// Destination issue number for a confirmed key.
    pub fn github_issue_number(&self, key: &str) -> Option<u64> {
        self.completed.get(key).copied()
    }

    /// Destination issue number for a pending key.
    pub fn pending_issue_number(&self, key: &str) -> Option<u64> {
        self.pending.get(key).copied()
    }

    /// Records a confirmed import.
    pub fn record_completed(&mut self, key: &str, number: u64) {
        self.completed.insert(key.to_string(), number);
        let line = format!("{key}:{number}");
        write_line(&mut self.mappings_writer, &line);
    }

    /// Records an import the destination accepted but is still processing.
    pub fn record_pending(&mut self, key: &str, number: u64) {
        self.pending.insert(key.to_string(), number);
        let line = format!("{key}:{number}");
        write_line(&mut self.pending_writer, &line);
    }

    /// Moves a key from the pending table to the completed table, the only
    /// legal transition between the two.
    pub fn promote(&mut self, key: &str) {
        if let Some(number) = self.pending.remove(key) {
            self.completed.insert(key.to_string(), number);
            let line = format!("{key}:{number}");
            write_line(&mut self.mappings_writer, &line);
        }
    }

    /// Re-records a still-unconfirmed key into this run's pending file.
    pub fn record_still_pending(&mut self, key: &str) {
        if let Some(number) = self.pending.get(key) {
            let line = format!("{key}:{number}");
            write_line(&mut self.pending_writer, &line);
        }
    }

    /// Records a failed import for the run summary and the failures file.
    pub fn record_failed_import(&mut self, reference: &str, reason: &str) {
        self.failed_import_count += 1;
        self.write_failures_line(&format!("=> {reference} [{reason}]"));
    }

    /// Appends a free-text diagnostic to the failures file.
    pub fn add_failure_message(&mut self, message: &str) {
        self.write_failures_line(message);
    }

    /// Counts a backport holder import; holders have no source key and are
    /// never mapped.
    pub fn record_backport_holder(&mut self) {
        self.backport_holder_count += 1;
    }

    pub fn failed_import_count(&self) -> usize {
        self.failed_import_count
    }

    pub fn backport_holder_count(&self) -> usize {
        self.backport_holder_count
    }

    fn write_failures_line(&mut self, line: &str) {
        write_line(&mut self.failures_writer, line);
    }
}

impl fmt::Display for MigrationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} imported issues, {} pending issues, {} failed imports, {} backported issue holders",
            self.completed.len(),
            self.pending.len(),
            self.failed_import_count,
            self.backport_holder_count
        )
    }
}

fn open_append(path: &Path) -> Result<File, ContextError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ContextError::Io {
            path: path.display().to_string(),
            source: e,
        })
}

fn load_mappings(path: &Path) -> Result<BTreeMap<String, u64>, ContextError> {
    let mut mappings = BTreeMap::new();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(mappings),
        Err(e) => {
            return Err(ContextError::Io {
                path: path.display().to_string(),
                source: e,
            })
        }
    };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once(':') {
            Some((key, number)) => match number.trim().parse() {
                Ok(number) => {
                    mappings.insert(key.trim().to_string(), number);
                }
                Err(_) => warn!(path = %path.display(), line, "Skipping malformed mapping line"),
            },
            None => warn!(path = %path.display(), line, "Skipping malformed mapping line"),
        }
    }
    Ok(mappings)
}

/// Appends one record and forces it to disk. Failures are logged rather
/// than propagated; the in-memory state stays authoritative for the rest
/// of the run.
fn write_line(writer: &mut File, line: &str) {
    let result = writeln!(writer, "{line}")
        .and_then(|()| writer.flush())
        .and_then(|()| writer.sync_data());
    if let Err(e) = result {
        error!(error = %e, line, "Failed to write import record");
    }
}
