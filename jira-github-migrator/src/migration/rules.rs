//! Pluggable business rules.
//!
//! Per-project migration policy lives in small capability traits: filters
//! decide what gets migrated, the label handler maps source field values to
//! destination labels, and issue processors get two hooks around request
//! building. Composites evaluate ordered lists of rule values: filters with
//! all-must-agree semantics, handlers and processors in sequence, each
//! seeing the shared mutable objects it is given.

use crate::github::{ImportRequest, LabelSpec};
use crate::jira::{JiraIssue, JiraVersion};

/// Decides whether a source issue is migrated at all.
pub trait IssueFilter: Send + Sync {
    fn accept(&self, _issue: &JiraIssue) -> bool {
        true
    }
}

/// All filters must accept an issue for it to be migrated.
#[derive(Default)]
pub struct CompositeIssueFilter {
    filters: Vec<Box<dyn IssueFilter>>,
}

impl CompositeIssueFilter {
    pub fn new(filters: Vec<Box<dyn IssueFilter>>) -> Self {
        Self { filters }
    }

    pub fn accept(&self, issue: &JiraIssue) -> bool {
        self.filters.iter().all(|filter| filter.accept(issue))
    }
}

/// Decides which source versions become destination milestones.
pub trait MilestoneFilter: Send + Sync {
    fn accept(&self, version: &JiraVersion) -> bool;
}

impl<F> MilestoneFilter for F
where
    F: Fn(&JiraVersion) -> bool + Send + Sync,
{
    fn accept(&self, version: &JiraVersion) -> bool {
        self(version)
    }
}

/// Maps source field values to destination labels.
pub trait LabelHandler: Send + Sync {
    /// Labels to apply to one issue.
    fn labels_for(&self, issue: &JiraIssue) -> Vec<String>;

    /// Every label this handler can produce, for up-front creation on the
    /// destination repository.
    fn all_labels(&self) -> Vec<LabelSpec>;
}

/// Applies handlers in order and unions their labels.
#[derive(Default)]
pub struct CompositeLabelHandler {
    handlers: Vec<Box<dyn LabelHandler>>,
}

impl CompositeLabelHandler {
    pub fn new(handlers: Vec<Box<dyn LabelHandler>>) -> Self {
        Self { handlers }
    }

    pub fn add(&mut self, handler: Box<dyn LabelHandler>) {
        self.handlers.push(handler);
    }
}

impl LabelHandler for CompositeLabelHandler {
    fn labels_for(&self, issue: &JiraIssue) -> Vec<String> {
        let mut labels = Vec::new();
        for handler in &self.handlers {
            for label in handler.labels_for(issue) {
                if !labels.contains(&label) {
                    labels.push(label);
                }
            }
        }
        labels
    }

    fn all_labels(&self) -> Vec<LabelSpec> {
        let mut labels: Vec<LabelSpec> = Vec::new();
        for handler in &self.handlers {
            for label in handler.all_labels() {
                if !labels.iter().any(|l| l.name == label.name) {
                    labels.push(label);
                }
            }
        }
        labels
    }
}

/// Source fields a [`FieldValueLabelHandler`] can map from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    IssueType,
    Priority,
    Version,
}

impl FieldType {
    /// Label color per source field family.
    fn color(self) -> &'static str {
        match self {
            Self::IssueType => "ededed",
            Self::Priority => "e8eef7",
            Self::Version => "fbca04",
        }
    }
}

/// Declarative (field, value) to label mapping.
#[derive(Default)]
pub struct FieldValueLabelHandler {
    mappings: Vec<(FieldType, String, String)>,
}

impl FieldValueLabelHandler {
    pub fn add_mapping(&mut self, field: FieldType, value: &str, label: &str) {
        self.mappings
            .push((field, value.to_lowercase(), label.to_string()));
    }

    fn field_values(field: FieldType, issue: &JiraIssue) -> Vec<String> {
        let fields = &issue.fields;
        match field {
            FieldType::IssueType => fields
                .issuetype
                .iter()
                .map(|t| t.name.to_lowercase())
                .collect(),
            FieldType::Priority => fields
                .priority
                .iter()
                .map(|p| p.name.to_lowercase())
                .collect(),
            FieldType::Version => fields
                .fix_versions
                .iter()
                .map(|v| v.name.to_lowercase())
                .collect(),
        }
    }
}

impl LabelHandler for FieldValueLabelHandler {
    fn labels_for(&self, issue: &JiraIssue) -> Vec<String> {
        let mut labels = Vec::new();
        for (field, value, label) in &self.mappings {
            if Self::field_values(*field, issue).contains(value) && !labels.contains(label) {
                labels.push(label.clone());
            }
        }
        labels
    }

    fn all_labels(&self) -> Vec<LabelSpec> {
        let mut labels: Vec<LabelSpec> = Vec::new();
        for (field, _, label) in &self.mappings {
            if !labels.iter().any(|l| &l.name == label) {
                labels.push(LabelSpec {
                    name: label.clone(),
                    color: field.color().to_string(),
                });
            }
        }
        labels
    }
}

/// Extension hooks around request building. `before_conversion` may mutate
/// the source snapshot prior to any rendering; `before_import` may adjust
/// the already-built request.
pub trait IssueProcessor: Send + Sync {
    fn before_conversion(&self, _issue: &mut JiraIssue) {}

    fn before_import(&self, _issue: &JiraIssue, _request: &mut ImportRequest) {}
}

/// Applies processors in order; rules see each other's effects only
/// through the shared mutable objects.
#[derive(Default)]
pub struct CompositeIssueProcessor {
    processors: Vec<Box<dyn IssueProcessor>>,
}

impl CompositeIssueProcessor {
    pub fn new(processors: Vec<Box<dyn IssueProcessor>>) -> Self {
        Self { processors }
    }
}

impl IssueProcessor for CompositeIssueProcessor {
    fn before_conversion(&self, issue: &mut JiraIssue) {
        for processor in &self.processors {
            processor.before_conversion(issue);
        }
    }

    fn before_import(&self, issue: &JiraIssue, request: &mut ImportRequest) {
        for processor in &self.processors {
            processor.before_import(issue, request);
        }
    }
}

/// The complete rule set one run is configured with.
pub struct MigrationRules {
    pub issue_filter: CompositeIssueFilter,
    pub milestone_filter: Box<dyn MilestoneFilter>,
    pub label_handler: Box<dyn LabelHandler>,
    pub issue_processor: CompositeIssueProcessor,
}

impl Default for MigrationRules {
    fn default() -> Self {
        default_rules()
    }
}

/// Placeholder versions used as status markers rather than releases; these
/// never become milestones.
const SKIP_VERSIONS: [&str; 6] = [
    "Contributions Welcome",
    "Pending Closure",
    "Waiting for Triage",
    "waiting-for-feedback",
    "backlog",
    "more-investigation",
];

/// The stock rule set: issue-type/priority/version label mappings, the
/// placeholder-version milestone filter, and the common processors.
pub fn default_rules() -> MigrationRules {
    let mut field_values = FieldValueLabelHandler::default();
    field_values.add_mapping(FieldType::IssueType, "Bug", "bug");
    field_values.add_mapping(FieldType::IssueType, "Improvement", "enhancement");
    field_values.add_mapping(FieldType::IssueType, "New Feature", "enhancement");
    field_values.add_mapping(FieldType::IssueType, "Task", "maintenance");
    field_values.add_mapping(FieldType::IssueType, "Dependency Upgrade", "dependencies");

    field_values.add_mapping(FieldType::Priority, "Blocker", "blocker");
    field_values.add_mapping(FieldType::Priority, "Critical", "critical");
    field_values.add_mapping(FieldType::Priority, "Major", "major");
    field_values.add_mapping(FieldType::Priority, "Minor", "minor");
    field_values.add_mapping(FieldType::Priority, "Trivial", "trivial");

    field_values.add_mapping(FieldType::Version, "waiting-for-feedback", "waiting-for-feedback");
    field_values.add_mapping(FieldType::Version, "more-investigation", "help wanted");

    let mut label_handler = CompositeLabelHandler::default();
    label_handler.add(Box::new(field_values));

    MigrationRules {
        issue_filter: CompositeIssueFilter::default(),
        milestone_filter: Box::new(|version: &JiraVersion| {
            !SKIP_VERSIONS.contains(&version.name.as_str())
        }),
        label_handler: Box::new(label_handler),
        issue_processor: CompositeIssueProcessor::new(vec![
            Box::new(DependencyBumpProcessor),
            Box::new(BotCommentProcessor::default()),
        ]),
    }
}

/// Labels dependency-bump maintenance issues as `dependencies`.
pub struct DependencyBumpProcessor;

impl IssueProcessor for DependencyBumpProcessor {
    fn before_import(&self, issue: &JiraIssue, request: &mut ImportRequest) {
        let is_maintenance = issue
            .fields
            .issuetype
            .as_ref()
            .is_some_and(|t| t.name == "Task" || t.name == "Improvement");
        let summary = issue.fields.summary.as_deref().unwrap_or_default();
        if is_maintenance && (summary.contains("Bump") || summary.contains("Upgrade")) {
            let label = "dependencies".to_string();
            if !request.issue.labels.contains(&label) {
                request.issue.labels.push(label);
            }
        }
    }
}

/// Drops comments left by automation accounts.
pub struct BotCommentProcessor {
    markers: Vec<String>,
}

impl Default for BotCommentProcessor {
    fn default() -> Self {
        Self {
            markers: vec![
                "ViewProfile.jspa?name=hudson".to_string(),
                "ViewProfile.jspa?name=githubbot".to_string(),
            ],
        }
    }
}

impl IssueProcessor for BotCommentProcessor {
    fn before_import(&self, _issue: &JiraIssue, request: &mut ImportRequest) {
        request
            .comments
            .retain(|comment| !self.markers.iter().any(|m| comment.body.contains(m)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::ImportComment;
    use serde_json::json;

    fn issue(issuetype: &str, priority: &str, summary: &str) -> JiraIssue {
        serde_json::from_value(json!({
            "key": "MNG-1",
            "fields": {
                "summary": summary,
                "created": "2013-05-21T10:21:14.000+0000",
                "updated": "2013-05-21T10:21:14.000+0000",
                "issuetype": {"name": issuetype},
                "priority": {"name": priority},
            }
        }))
        .unwrap()
    }

    struct RejectAll;
    impl IssueFilter for RejectAll {
        fn accept(&self, _issue: &JiraIssue) -> bool {
            false
        }
    }

    struct AcceptAll;
    impl IssueFilter for AcceptAll {}

    #[test]
    fn composite_filter_requires_unanimity() {
        let issue = issue("Bug", "Major", "A bug");

        let all_agree = CompositeIssueFilter::new(vec![Box::new(AcceptAll), Box::new(AcceptAll)]);
        assert!(all_agree.accept(&issue));

        let one_rejects = CompositeIssueFilter::new(vec![Box::new(AcceptAll), Box::new(RejectAll)]);
        assert!(!one_rejects.accept(&issue));

        assert!(CompositeIssueFilter::default().accept(&issue));
    }

    #[test]
    fn field_values_map_to_labels() {
        let rules = default_rules();
        let labels = rules.label_handler.labels_for(&issue("Bug", "Blocker", "Broken"));
        assert_eq!(labels, vec!["bug".to_string(), "blocker".to_string()]);
    }

    #[test]
    fn all_labels_deduplicates_and_colors() {
        let rules = default_rules();
        let all = rules.label_handler.all_labels();

        // "enhancement" is mapped from two issue types but created once.
        assert_eq!(all.iter().filter(|l| l.name == "enhancement").count(), 1);
        let bug = all.iter().find(|l| l.name == "bug").unwrap();
        assert_eq!(bug.color, "ededed");
    }

    #[test]
    fn milestone_filter_skips_placeholder_versions() {
        let rules = default_rules();
        let version = |name: &str| JiraVersion {
            name: name.to_string(),
            released: false,
            release_date: None,
        };
        assert!(rules.milestone_filter.accept(&version("3.2.1")));
        assert!(!rules.milestone_filter.accept(&version("Waiting for Triage")));
    }

    #[test]
    fn dependency_bumps_get_the_dependencies_label() {
        let mut request = ImportRequest::default();
        request.issue.labels.push("maintenance".to_string());

        DependencyBumpProcessor.before_import(&issue("Task", "Minor", "Bump junit to 4.13"), &mut request);
        assert!(request.issue.labels.contains(&"dependencies".to_string()));

        let mut unrelated = ImportRequest::default();
        DependencyBumpProcessor.before_import(&issue("Bug", "Minor", "Bump fails"), &mut unrelated);
        assert!(unrelated.issue.labels.is_empty());
    }

    #[test]
    fn bot_comments_are_dropped() {
        let mut request = ImportRequest::default();
        request.comments = vec![
            ImportComment {
                created_at: None,
                body: "looks good".to_string(),
            },
            ImportComment {
                created_at: None,
                body: "Build failed, see ViewProfile.jspa?name=hudson".to_string(),
            },
        ];

        BotCommentProcessor::default().before_import(&issue("Bug", "Major", "x"), &mut request);
        assert_eq!(request.comments.len(), 1);
        assert_eq!(request.comments[0].body, "looks good");
    }
}
