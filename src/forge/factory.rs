//! forge::factory
//!
//! Creation of [`GitData`] clients.
//!
//! # Design
//!
//! The publisher and the scheduler never construct a client themselves.
//! They ask a [`Connector`] for one per (repository, token) pair, which
//! keeps the engine independent of the concrete API backend:
//!
//! - [`GitHubConnector`] builds a [`GitHubClient`] against a configurable
//!   API base (github.com, GitHub Enterprise, or a local test server)
//! - [`MockConnector`] hands out shared [`MockGitData`] instances by
//!   repository, for deterministic tests
//!
//! # Example
//!
//! ```ignore
//! use autocommitter::core::types::RepositoryRef;
//! use autocommitter::forge::{Connector, GitHubConnector};
//!
//! let connector = GitHubConnector::default();
//! let repo = RepositoryRef::parse("https://github.com/owner/repo")?;
//! let api = connector.connect(&repo, "ghp_token")?;
//! let info = api.get_repository().await?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::github::{GitHubClient, DEFAULT_API_BASE, DEFAULT_TIMEOUT};
use super::mock::MockGitData;
use super::traits::{ForgeError, GitData};
use crate::core::types::RepositoryRef;

/// Source of Git Data clients.
pub trait Connector: Send + Sync {
    /// Create a client for `repository` that authenticates with `token`.
    fn connect(
        &self,
        repository: &RepositoryRef,
        token: &str,
    ) -> Result<Box<dyn GitData>, ForgeError>;
}

/// Connects to the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubConnector {
    api_base: String,
    timeout: Duration,
}

impl Default for GitHubConnector {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GitHubConnector {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into(),
            timeout,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Connector for GitHubConnector {
    fn connect(
        &self,
        repository: &RepositoryRef,
        token: &str,
    ) -> Result<Box<dyn GitData>, ForgeError> {
        let client =
            GitHubClient::with_options(token, repository.clone(), &self.api_base, self.timeout)?;
        Ok(Box::new(client))
    }
}

/// Hands out in-memory repositories.
///
/// Repositories registered with [`MockConnector::insert`] are returned as
/// clones sharing state, so a test can inspect them after the engine ran.
/// Unregistered repositories connect to a [`MockGitData::missing`] instance.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    repositories: Arc<Mutex<HashMap<String, MockGitData>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `api` under its repository.
    pub fn insert(&self, api: MockGitData) -> &Self {
        let key = api.repository().to_string();
        self.lock().insert(key, api);
        self
    }

    /// The registered mock for `repository`, if any.
    pub fn get(&self, repository: &RepositoryRef) -> Option<MockGitData> {
        self.lock().get(&repository.to_string()).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, MockGitData>> {
        // A poisoned map only means a test panicked while holding it.
        match self.repositories.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Connector for MockConnector {
    fn connect(
        &self,
        repository: &RepositoryRef,
        token: &str,
    ) -> Result<Box<dyn GitData>, ForgeError> {
        if token.is_empty() {
            return Err(ForgeError::AuthFailed("Bad credentials".into()));
        }
        let api = self
            .get(repository)
            .unwrap_or_else(|| MockGitData::missing(repository.clone()));
        Ok(Box::new(api))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(name: &str) -> RepositoryRef {
        RepositoryRef::new("owner", name).unwrap()
    }

    #[test]
    fn github_connector_defaults() {
        let connector = GitHubConnector::default();
        assert_eq!(connector.api_base(), "https://api.github.com");
        assert_eq!(connector.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn github_connector_builds_client() {
        let connector = GitHubConnector::new("http://127.0.0.1:9", Duration::from_secs(1));
        let api = connector.connect(&repo("a"), "token").unwrap();
        assert_eq!(api.repository(), &repo("a"));
    }

    #[tokio::test]
    async fn mock_connector_shares_state() {
        let connector = MockConnector::new();
        connector.insert(MockGitData::with_initial_commit(
            repo("a"),
            "main",
            &[("a.txt", "a")],
        ));

        let api = connector.connect(&repo("a"), "token").unwrap();
        api.create_blob("x").await.unwrap();

        let registered = connector.get(&repo("a")).unwrap();
        assert_eq!(registered.blob_count(), 2);
    }

    #[tokio::test]
    async fn mock_connector_unknown_repository_is_missing() {
        let connector = MockConnector::new();
        let api = connector.connect(&repo("ghost"), "token").unwrap();
        assert!(api.get_repository().await.unwrap_err().is_not_found());
    }

    #[test]
    fn mock_connector_rejects_empty_token() {
        let connector = MockConnector::new();
        assert!(matches!(
            connector.connect(&repo("a"), ""),
            Err(ForgeError::AuthFailed(_))
        ));
    }
}
