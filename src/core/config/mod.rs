//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first hit wins:
//! 1. The `--config` path, when given (must exist)
//! 2. `$AUTOCOMMITTER_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/autocommitter/config.toml`
//! 4. `~/.autocommitter/config.toml`
//!
//! A missing file is not an error; defaults are used.
//!
//! # Token
//!
//! The token may live in the file or in `$GITHUB_TOKEN`. The file wins.
//!
//! # Example
//!
//! ```no_run
//! use autocommitter::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("branch: {}", config.branch());
//! println!("interval: {:?}", config.interval());
//! ```

pub mod schema;

pub use schema::{BotConfig, CustomContentConfig, RepositoryConfig, RetryConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::content::{ContentKind, DEFAULT_CUSTOM_PATH};
use crate::core::types::{FileChange, RepositoryRef};
use crate::engine::retry::RetryPolicy;
use crate::forge::github::{DEFAULT_API_BASE, DEFAULT_TIMEOUT};
use schema::{DEFAULT_BRANCH, DEFAULT_INTERVAL_SECS, DEFAULT_INTER_REPO_DELAY_MS, DEFAULT_MESSAGE};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "AUTOCOMMITTER_CONFIG";

/// Environment variable holding a token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("missing config value: {0}")]
    Missing(&'static str),
}

/// A repository the bot publishes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub repository: RepositoryRef,
    pub branch: String,
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub file: BotConfig,
    /// Path the configuration was read from, if any
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `explicit` or the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if `explicit` cannot be read, or if a config file
    /// exists but cannot be parsed or fails validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(),
        };

        match path {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Read, parse and validate a config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::parse(&contents).map_err(|e| match e {
            ConfigError::ParseError { message, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(Self {
            path: Some(path.to_path_buf()),
            ..config
        })
    }

    /// Parse and validate config text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let file: BotConfig = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        file.validate()?;
        Ok(Self { file, path: None })
    }

    pub fn from_file(file: BotConfig) -> Result<Self, ConfigError> {
        file.validate()?;
        Ok(Self { file, path: None })
    }

    /// First existing file among the default locations.
    fn discover() -> Option<PathBuf> {
        // 1. $AUTOCOMMITTER_CONFIG
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. $XDG_CONFIG_HOME/autocommitter/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("autocommitter/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. ~/.autocommitter/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".autocommitter/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // =========================================================================
    // Accessors with defaults
    // =========================================================================

    pub fn branch(&self) -> &str {
        self.file.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }

    pub fn message(&self) -> &str {
        self.file.message.as_deref().unwrap_or(DEFAULT_MESSAGE)
    }

    /// Token from the file, else from `$GITHUB_TOKEN`.
    pub fn token(&self) -> Option<String> {
        self.token_or(std::env::var(TOKEN_ENV).ok())
    }

    /// Token from the file, else `fallback`. Blank values count as absent.
    pub fn token_or(&self, fallback: Option<String>) -> Option<String> {
        self.file
            .token
            .clone()
            .or(fallback)
            .filter(|t| !t.trim().is_empty())
    }

    pub fn files(&self) -> &[FileChange] {
        &self.file.files
    }

    pub fn commit_type(&self) -> ContentKind {
        self.file.commit_type.unwrap_or_default()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.file.interval.unwrap_or(DEFAULT_INTERVAL_SECS))
    }

    pub fn inter_repo_delay(&self) -> Duration {
        Duration::from_millis(
            self.file
                .inter_repo_delay_ms
                .unwrap_or(DEFAULT_INTER_REPO_DELAY_MS),
        )
    }

    pub fn api_base(&self) -> &str {
        self.file.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    pub fn timeout(&self) -> Duration {
        self.file
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.file.log_file.as_ref().map(PathBuf::from)
    }

    pub fn custom_path(&self) -> &str {
        self.file
            .custom
            .as_ref()
            .map(CustomContentConfig::path)
            .unwrap_or(DEFAULT_CUSTOM_PATH)
    }

    pub fn custom_template(&self) -> Option<&str> {
        self.file.custom.as_ref().and_then(|c| c.content.as_deref())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let default = RetryPolicy::default();
        match &self.file.retry {
            Some(retry) => RetryPolicy {
                max_attempts: retry.max_attempts.unwrap_or(default.max_attempts),
                base_delay: retry
                    .base_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default.base_delay),
            },
            None => default,
        }
    }

    /// The single repository of `repo_url`.
    ///
    /// # Errors
    ///
    /// `ConfigError::Missing` when `repo_url` is not set.
    pub fn repository(&self) -> Result<RepositoryRef, ConfigError> {
        let url = self
            .file
            .repo_url
            .as_deref()
            .ok_or(ConfigError::Missing("repo_url"))?;
        RepositoryRef::parse(url).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    /// Repositories the scheduler publishes to, in configured order.
    ///
    /// Active entries of `repositories` when the list is non-empty,
    /// otherwise `repo_url` on the top-level branch.
    pub fn targets(&self) -> Result<Vec<Target>, ConfigError> {
        if self.file.repositories.is_empty() {
            return Ok(vec![Target {
                repository: self.repository()?,
                branch: self.branch().to_string(),
            }]);
        }

        self.file
            .repositories
            .iter()
            .filter(|r| r.active)
            .map(|r| {
                let repository = RepositoryRef::parse(&r.url)
                    .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
                Ok(Target {
                    repository,
                    branch: r.branch.clone().unwrap_or_else(|| self.branch().to_string()),
                })
            })
            .collect()
    }
}
