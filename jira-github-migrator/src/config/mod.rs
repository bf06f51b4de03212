//! Migration settings loading.
//!
//! This module parses the TOML settings file describing the source Jira
//! project, the destination GitHub repository and the static user table.

mod error;
mod settings;

pub use error::ConfigError;
pub use settings::{GithubConfig, JiraConfig, MarkupConfig, MigrationConfig};

use std::path::Path;
use tracing::info;

/// Loads and validates the migration settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file can't be read, isn't valid TOML, or fails
/// validation (empty project id, malformed repository slug).
pub fn load_config(path: &Path) -> Result<MigrationConfig, ConfigError> {
    info!(path = %path.display(), "Loading migration settings");

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;

    let config: MigrationConfig = toml::from_str(&content).map_err(|e| ConfigError::TomlError {
        path: path.display().to_string(),
        source: e,
    })?;

    validate(&config, path)?;
    Ok(config)
}

fn validate(config: &MigrationConfig, path: &Path) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::ValidationError {
        path: path.display().to_string(),
        message: message.to_string(),
    };

    if config.jira.project_id.trim().is_empty() {
        return Err(invalid("jira.project-id must not be empty"));
    }
    if config.jira.base_url.trim().is_empty() {
        return Err(invalid("jira.base-url must not be empty"));
    }
    let slug = &config.github.repository_slug;
    match slug.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {}
        _ => return Err(invalid("github.repository-slug must be in owner/name form")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const VALID: &str = r#"
[jira]
base-url = "https://issues.example.org/jira"
project-id = "MNG"
migrate-jql = "project = MNG ORDER BY key ASC"

[github]
repository-slug = "acme/maven-mirror"
access-token = "token-value"

[markup]
cutoff-date = "2010-06-01T00:00:00Z"

[users]
"jsmith" = "jsmith-gh"
"#;

    fn write_config(content: &str) -> (TempDir, std::path::PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("migration.toml");
        fs::write(&path, content).unwrap();
        (temp, path)
    }

    #[test]
    fn can_load_config() {
        let (_temp, path) = write_config(VALID);
        let config = load_config(&path).unwrap();

        assert_eq!(config.jira.project_id, "MNG");
        assert_eq!(config.github.owner(), "acme");
        assert_eq!(config.github.repository(), "maven-mirror");
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert!(!config.github.test_mode());
        assert_eq!(config.users.get("jsmith").unwrap(), "jsmith-gh");
    }

    #[test]
    fn rejects_malformed_slug() {
        let (_temp, path) = write_config(&VALID.replace("acme/maven-mirror", "acme"));
        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let temp = TempDir::new().unwrap();
        let result = load_config(&temp.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }

    #[test]
    fn browse_and_profile_urls() {
        let (_temp, path) = write_config(VALID);
        let config = load_config(&path).unwrap();

        assert_eq!(
            config.jira.browse_url("MNG-123"),
            "https://issues.example.org/jira/browse/MNG-123"
        );
        assert_eq!(
            config.jira.profile_url("jsmith"),
            "https://issues.example.org/jira/secure/ViewProfile.jspa?name=jsmith"
        );
    }
}
