//! Markup conversion.
//!
//! The source tracker changed its rich-text dialect over time, so the
//! conversion rules depend on when an issue was created: a cutoff date
//! selects between the wiki-markup engine and the plain markdown engine.

mod engines;

pub use engines::{MarkdownEngine, WikiMarkupEngine};

use crate::jira::JiraUser;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Converts source rich text into destination-flavored markdown.
pub trait Markup: Send + Sync {
    /// Converts a body of source text.
    fn convert(&self, text: &str) -> String;

    /// Renders a link.
    fn link(&self, label: &str, url: &str) -> String;
}

/// Owns the per-era engines and picks one per issue.
#[derive(Debug)]
pub struct MarkupManager {
    cutoff: DateTime<Utc>,
    wiki: WikiMarkupEngine,
    markdown: MarkdownEngine,
}

impl MarkupManager {
    /// Creates a manager with the given era boundary.
    pub fn new(cutoff: DateTime<Utc>) -> Self {
        Self {
            cutoff,
            wiki: WikiMarkupEngine::default(),
            markdown: MarkdownEngine::default(),
        }
    }

    /// Installs the user table both engines use to resolve `[~user]`
    /// mentions into display names.
    pub fn configure_user_lookup(&mut self, users: &HashMap<String, JiraUser>) {
        let lookup: HashMap<String, String> = users
            .iter()
            .map(|(key, user)| (key.clone(), user.display().to_string()))
            .collect();
        self.wiki.user_lookup = lookup.clone();
        self.markdown.user_lookup = lookup;
    }

    /// Picks the engine for content created at the given time.
    pub fn engine(&self, created: DateTime<Utc>) -> &dyn Markup {
        if created < self.cutoff {
            &self.wiki
        } else {
            &self.markdown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn engine_selection_follows_the_cutoff() {
        let cutoff = Utc.with_ymd_and_hms(2010, 6, 1, 0, 0, 0).unwrap();
        let manager = MarkupManager::new(cutoff);

        let before = Utc.with_ymd_and_hms(2009, 1, 1, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();

        // The wiki engine rewrites headings; the markdown engine must not.
        assert_eq!(manager.engine(before).convert("h1. Title"), "# Title");
        assert_eq!(manager.engine(after).convert("h1. Title"), "h1. Title");
    }
}
