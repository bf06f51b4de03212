//! Concrete markup engines.

use super::Markup;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static USER_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[~([A-Za-z0-9._@-]+)\]").unwrap());
static AT_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|[\s(])@(\w[\w-]*)").unwrap());
static ISSUE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|[\s(])#(\d+)").unwrap());
static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]|]+)\|([^\]\s]+)\]").unwrap());
static WIKI_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^h([1-6])\.\s*").unwrap());
static WIKI_CODE_LANG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{code:([A-Za-z0-9]+)[^}]*\}").unwrap());
static WIKI_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{code[^}]*\}|\{noformat\}").unwrap());
static WIKI_QUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{quote\}").unwrap());
static WIKI_MONOSPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^}\n]+)\}\}").unwrap());
static WIKI_BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").unwrap());

/// Replaces `[~user]` mentions with the user's display name and neutralizes
/// tokens GitHub would otherwise turn into mentions or issue links.
fn resolve_and_escape(text: &str, user_lookup: &HashMap<String, String>) -> String {
    let text = USER_MENTION.replace_all(text, |caps: &regex::Captures<'_>| {
        user_lookup.get(&caps[1]).map_or_else(
            || caps[1].to_string(),
            |display_name| format!("**{display_name}**"),
        )
    });
    let text = AT_REFERENCE.replace_all(&text, "$1`@$2`");
    ISSUE_REFERENCE.replace_all(&text, "$1`#$2`").into_owned()
}

/// Engine for issues created after the wiki-markup era: description and
/// comment bodies are already markdown-like, so conversion is limited to
/// mention resolution and reference escaping.
#[derive(Debug, Default)]
pub struct MarkdownEngine {
    pub(super) user_lookup: HashMap<String, String>,
}

impl Markup for MarkdownEngine {
    fn convert(&self, text: &str) -> String {
        resolve_and_escape(text, &self.user_lookup)
    }

    fn link(&self, label: &str, url: &str) -> String {
        format!("[{label}]({url})")
    }
}

/// Engine for issues created while the source tracker still rendered wiki
/// markup: rewrites the common wiki constructs into markdown before the
/// shared mention handling.
#[derive(Debug, Default)]
pub struct WikiMarkupEngine {
    pub(super) user_lookup: HashMap<String, String>,
}

impl Markup for WikiMarkupEngine {
    fn convert(&self, text: &str) -> String {
        let text = WIKI_CODE_LANG.replace_all(text, "```$1");
        let text = WIKI_CODE.replace_all(&text, "```");
        let text = WIKI_QUOTE.replace_all(&text, "> ");
        let text = WIKI_HEADING.replace_all(&text, |caps: &regex::Captures<'_>| {
            let level: usize = caps[1].parse().unwrap_or(1);
            format!("{} ", "#".repeat(level))
        });
        let text = WIKI_LINK.replace_all(&text, "[$1]($2)");
        let text = WIKI_MONOSPACE.replace_all(&text, "`$1`");
        let text = WIKI_BOLD.replace_all(&text, "**$1**");
        resolve_and_escape(&text, &self.user_lookup)
    }

    fn link(&self, label: &str, url: &str) -> String {
        format!("[{label}]({url})")
    }
}
