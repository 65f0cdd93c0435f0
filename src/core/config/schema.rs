//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Config values are validated after parsing: repository URLs must parse,
//! branches must be non-empty and the schedule must have a positive
//! interval.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::content::{ContentKind, DEFAULT_CUSTOM_PATH};
use crate::core::types::{FileChange, RepositoryRef};

/// Default branch to publish to.
pub const DEFAULT_BRANCH: &str = "main";

/// Default commit message prefix.
pub const DEFAULT_MESSAGE: &str = "Auto-commit: Update files";

/// Default seconds between scheduled batches.
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Default pause between repositories within a batch.
pub const DEFAULT_INTER_REPO_DELAY_MS: u64 = 1000;

/// Bot configuration.
///
/// # Example
///
/// ```toml
/// repo_url = "https://github.com/owner/repo"
/// branch = "main"
/// message = "Auto-commit: Update files"
/// commit_type = "readme"
/// interval = 300
///
/// [[files]]
/// path = "notes/hello.md"
/// content = "hello"
///
/// [custom]
/// path = "auto-commits/activity.md"
/// content = "Commit #{commitNumber} at {timestamp}"
///
/// [retry]
/// max_attempts = 3
/// base_delay_ms = 1000
///
/// [[repositories]]
/// url = "https://github.com/owner/other"
/// branch = "gh-pages"
/// active = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    /// Repository to publish to when `repositories` is empty
    pub repo_url: Option<String>,

    /// Branch to publish to (default: "main")
    pub branch: Option<String>,

    /// Personal access token; `$GITHUB_TOKEN` is used when absent
    pub token: Option<String>,

    /// Commit message prefix (default: "Auto-commit: Update files")
    pub message: Option<String>,

    /// Files committed by `publish` when none are given on the command line
    pub files: Vec<FileChange>,

    /// Generated content for scheduled commits (default: simple)
    pub commit_type: Option<ContentKind>,

    /// Seconds between scheduled batches (default: 300)
    pub interval: Option<u64>,

    /// Milliseconds between repositories within a batch (default: 1000)
    pub inter_repo_delay_ms: Option<u64>,

    /// API base URL (default: https://api.github.com)
    pub api_base: Option<String>,

    /// Per-call HTTP timeout in seconds (default: 30)
    pub timeout: Option<u64>,

    /// File receiving one JSON line per scheduled attempt
    pub log_file: Option<String>,

    pub custom: Option<CustomContentConfig>,

    pub retry: Option<RetryConfig>,

    /// Repositories managed by the scheduler
    pub repositories: Vec<RepositoryConfig>,
}

impl BotConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.repo_url {
            RepositoryRef::parse(url)
                .map_err(|e| ConfigError::InvalidValue(format!("repo_url: {}", e)))?;
        }

        if let Some(branch) = &self.branch {
            if branch.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "branch cannot be empty".to_string(),
                ));
            }
        }

        if let Some(message) = &self.message {
            if message.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "message cannot be empty".to_string(),
                ));
            }
        }

        if self.interval == Some(0) {
            return Err(ConfigError::InvalidValue(
                "interval must be at least 1 second".to_string(),
            ));
        }

        if self.timeout == Some(0) {
            return Err(ConfigError::InvalidValue(
                "timeout must be at least 1 second".to_string(),
            ));
        }

        if let Some(custom) = &self.custom {
            custom.validate()?;
        }

        if let Some(retry) = &self.retry {
            retry.validate()?;
        }

        for repo in &self.repositories {
            repo.validate()?;
        }

        Ok(())
    }
}

/// Path and template of `custom` commits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CustomContentConfig {
    /// File path (default: "auto-commits/activity.md")
    pub path: Option<String>,
    /// Template with `{placeholder}` substitutions
    pub content: Option<String>,
}

impl CustomContentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            if path.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "custom.path cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_CUSTOM_PATH)
    }
}

/// Ref update retry settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Ref update attempts before giving up (default: 3)
    pub max_attempts: Option<u32>,
    /// Backoff unit in milliseconds (default: 1000)
    pub base_delay_ms: Option<u64>,
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == Some(0) {
            return Err(ConfigError::InvalidValue(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One repository managed by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    pub url: String,
    /// Overrides the top-level branch
    #[serde(default)]
    pub branch: Option<String>,
    /// Inactive repositories are skipped
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl RepositoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        RepositoryRef::parse(&self.url).map_err(|e| {
            ConfigError::InvalidValue(format!("repositories: {}", e))
        })?;
        if let Some(branch) = &self.branch {
            if branch.trim().is_empty() {
                return Err(ConfigError::InvalidValue(format!(
                    "repositories: branch for '{}' cannot be empty",
                    self.url
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod bot_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = BotConfig::default();
            assert!(config.repo_url.is_none());
            assert!(config.repositories.is_empty());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn full_document() {
            let toml = r#"
                repo_url = "https://github.com/owner/repo"
                branch = "develop"
                message = "chore: tick"
                commit_type = "version"
                interval = 60

                [[files]]
                path = "a.txt"
                content = "hello"

                [custom]
                content = "{timestamp}"

                [retry]
                max_attempts = 5

                [[repositories]]
                url = "https://github.com/owner/other"
                active = false
            "#;
            let config: BotConfig = toml::from_str(toml).unwrap();
            assert!(config.validate().is_ok());
            assert_eq!(config.commit_type, Some(ContentKind::Version));
            assert_eq!(config.files, vec![FileChange::new("a.txt", "hello")]);
            assert_eq!(config.custom.as_ref().unwrap().path(), DEFAULT_CUSTOM_PATH);
            assert_eq!(config.retry.as_ref().unwrap().max_attempts, Some(5));
            assert!(!config.repositories[0].active);
        }

        #[test]
        fn invalid_repo_url() {
            let config = BotConfig {
                repo_url: Some("not a url".into()),
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidValue(_))
            ));
        }

        #[test]
        fn zero_interval_rejected() {
            let config = BotConfig {
                interval: Some(0),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn empty_branch_rejected() {
            let config = BotConfig {
                branch: Some(" ".into()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn unknown_commit_type_rejected() {
            let result: Result<BotConfig, _> = toml::from_str(r#"commit_type = "weird""#);
            assert!(result.is_err());
        }

        #[test]
        fn reject_unknown_fields() {
            let result: Result<BotConfig, _> = toml::from_str(r#"unknown = true"#);
            assert!(result.is_err());
        }

        #[test]
        fn roundtrip() {
            let config = BotConfig {
                repo_url: Some("https://github.com/owner/repo".into()),
                interval: Some(120),
                repositories: vec![RepositoryConfig {
                    url: "https://github.com/owner/other".into(),
                    branch: Some("main".into()),
                    active: true,
                }],
                ..Default::default()
            };
            let text = toml::to_string(&config).unwrap();
            let parsed: BotConfig = toml::from_str(&text).unwrap();
            assert_eq!(config, parsed);
        }
    }

    mod repository_config {
        use super::*;

        #[test]
        fn active_by_default() {
            let repo: RepositoryConfig =
                toml::from_str(r#"url = "https://github.com/o/r""#).unwrap();
            assert!(repo.active);
            assert!(repo.validate().is_ok());
        }

        #[test]
        fn invalid_url() {
            let repo = RepositoryConfig {
                url: "https://github.com/only-owner".into(),
                branch: None,
                active: true,
            };
            assert!(repo.validate().is_err());
        }
    }

    mod retry_config {
        use super::*;

        #[test]
        fn zero_attempts_rejected() {
            let retry = RetryConfig {
                max_attempts: Some(0),
                base_delay_ms: None,
            };
            assert!(retry.validate().is_err());
        }
    }
}
