//! The import orchestration core.
//!
//! Converts source issues into destination-shaped import requests using
//! pluggable business rules, drains them through the rate-limited
//! asynchronous import protocol, keeps a durable source-key to
//! destination-number mapping so re-runs never re-import completed work,
//! and reconciles imports a prior run left pending.

mod backports;
mod context;
mod engine;
mod import_builder;
mod reconcile;
mod rules;

pub use backports::{collect_backports, holder_request, BackportGroup};
pub use context::{ContextError, MigrationContext, FAILURES_FILE, MAPPINGS_FILE, PENDING_FILE};
pub use engine::{
    is_not_planned, ImportEngine, SubmittedImport, IMPORT_BATCH_SIZE, MAX_POLL_RETRIES,
};
pub use import_builder::{pull_request_refs, BuildError, ImportBuilder};
pub use reconcile::reconcile_pending;
pub use rules::{
    default_rules, BotCommentProcessor, CompositeIssueFilter, CompositeIssueProcessor,
    CompositeLabelHandler, DependencyBumpProcessor, FieldType, FieldValueLabelHandler,
    IssueFilter, IssueProcessor, LabelHandler, MigrationRules, MilestoneFilter,
};
