//! engine::publisher
//!
//! Publishes a set of file changes to a branch as one new commit.
//!
//! # Protocol
//!
//! ```text
//! validate -> repository -> base state -> blobs -> tree -> commit -> ref update
//! ```
//!
//! Every step before the ref update aborts the attempt on its first error.
//! The ref update is the only contended step and is driven by
//! [`RefUpdate`](super::ref_update::RefUpdate), which retries fast-forward
//! rejections under the publisher's [`RetryPolicy`].
//!
//! # Bootstrapping a branch
//!
//! When the requested branch does not exist, the new commit is parented on
//! the tip of the repository's default branch (`main` when the repository
//! does not declare one) and the ref is created rather than updated. If the
//! requested branch *is* the default branch, or the default branch has no
//! ref either, the repository is treated as empty.
//!
//! # Example
//!
//! ```ignore
//! use autocommitter::core::types::FileChange;
//! use autocommitter::engine::publisher::CommitPublisher;
//!
//! let publisher = CommitPublisher::github();
//! let result = publisher
//!     .publish_url(
//!         "https://github.com/owner/repo",
//!         "main",
//!         &token,
//!         "Auto-commit: Update files",
//!         &[FileChange::new("activity.md", "hello")],
//!     )
//!     .await?;
//! println!("{} {}", result.sha, result.url);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::PublishError;
use super::ref_update::RefUpdate;
use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::core::types::{
    partition_files, BranchState, CommitAttempt, CommitResult, FileChange, RepositoryRef,
    TreeEntry,
};
use crate::forge::{Connector, ForgeError, GitData, GitHubConnector};

/// Branch assumed when the repository does not report a default.
pub const FALLBACK_DEFAULT_BRANCH: &str = "main";

/// Builds and publishes commits.
#[derive(Clone)]
pub struct CommitPublisher {
    connector: Arc<dyn Connector>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for CommitPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitPublisher")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl CommitPublisher {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            sleeper: Arc::new(TokioSleeper),
            policy: RetryPolicy::default(),
        }
    }

    /// A publisher talking to `api.github.com`.
    pub fn github() -> Self {
        Self::new(Arc::new(GitHubConnector::default()))
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Parse `repo_url` and publish to it.
    ///
    /// A malformed URL is rejected before any request is made.
    pub async fn publish_url(
        &self,
        repo_url: &str,
        branch: &str,
        token: &str,
        message: &str,
        files: &[FileChange],
    ) -> Result<CommitResult, PublishError> {
        let repository = RepositoryRef::parse(repo_url)?;
        self.publish(&repository, branch, token, message, files)
            .await
    }

    /// Publish `files` to `branch` of `repository` as one commit.
    pub async fn publish(
        &self,
        repository: &RepositoryRef,
        branch: &str,
        token: &str,
        message: &str,
        files: &[FileChange],
    ) -> Result<CommitResult, PublishError> {
        if token.trim().is_empty() {
            return Err(PublishError::Validation("token is required".into()));
        }
        validate_request(branch, message)?;
        let api = self.connector.connect(repository, token)?;
        self.publish_with(api.as_ref(), branch, message, files)
            .await
    }

    /// Publish through an existing client.
    pub async fn publish_with(
        &self,
        api: &dyn GitData,
        branch: &str,
        message: &str,
        files: &[FileChange],
    ) -> Result<CommitResult, PublishError> {
        let mut attempt = CommitAttempt::new(api.repository().clone(), branch, message);
        self.publish_attempt(api, &mut attempt, files).await
    }

    /// Run `attempt` to a terminal state, filling in each step's shas.
    ///
    /// On return `attempt` is terminal: `Success` with the new commit, or
    /// `Failed` with the error text and whatever steps completed.
    pub async fn publish_attempt(
        &self,
        api: &dyn GitData,
        attempt: &mut CommitAttempt,
        files: &[FileChange],
    ) -> Result<CommitResult, PublishError> {
        let result = self.run_attempt(api, attempt, files).await;

        match &result {
            Ok(done) => {
                info!(
                    repository = %attempt.repository,
                    branch = %attempt.branch,
                    sha = %done.sha,
                    base = attempt.base_commit_sha.as_deref().unwrap_or("-"),
                    tree = attempt.new_tree_sha.as_deref().unwrap_or("-"),
                    retries = done.retries,
                    "commit published"
                );
            }
            Err(err) => {
                attempt.fail(err);
                warn!(
                    repository = %attempt.repository,
                    branch = %attempt.branch,
                    status = %attempt.status,
                    kind = err.kind(),
                    base = attempt.base_commit_sha.as_deref().unwrap_or("-"),
                    retries = attempt.retries,
                    error = attempt.error.as_deref().unwrap_or_default(),
                    "commit publish failed"
                );
            }
        }
        result
    }

    async fn run_attempt(
        &self,
        api: &dyn GitData,
        attempt: &mut CommitAttempt,
        files: &[FileChange],
    ) -> Result<CommitResult, PublishError> {
        validate_request(&attempt.branch, &attempt.message)?;
        let files = filter_files(files)?;
        let branch = attempt.branch.clone();

        let repo = api.get_repository().await.map_err(|err| {
            if err.is_not_found() {
                PublishError::RepositoryNotFound(api.repository().to_string())
            } else {
                PublishError::Api(err)
            }
        })?;
        debug!(repository = %repo.full_name, default_branch = ?repo.default_branch, "repository accessible");

        let default_branch = repo
            .default_branch
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(FALLBACK_DEFAULT_BRANCH);
        let base = resolve_base(api, &branch, default_branch).await?;
        attempt.base_commit_sha = Some(base.tip_commit_sha.clone());
        attempt.base_tree_sha = Some(base.tip_tree_sha.clone());
        debug!(
            branch = %branch,
            exists = base.exists,
            base_commit = %base.tip_commit_sha,
            "base resolved"
        );

        let mut entries = Vec::with_capacity(files.len());
        for file in &files {
            let blob = api.create_blob(&file.content).await?;
            debug!(path = %file.path, sha = %blob.sha, "blob created");
            entries.push(TreeEntry::blob(file.path.clone(), blob.sha));
        }

        let tree = api.create_tree(&base.tip_tree_sha, &entries).await?;
        attempt.new_tree_sha = Some(tree.sha.clone());
        debug!(sha = %tree.sha, entries = entries.len(), "tree created");

        let parents = vec![base.tip_commit_sha.clone()];
        let commit = api
            .create_commit(&attempt.message, &tree.sha, &parents)
            .await?;
        debug!(sha = %commit.sha, "commit created");

        let outcome = RefUpdate::new(
            api,
            self.sleeper.as_ref(),
            self.policy,
            &branch,
            &commit.sha,
        )
        .run()
        .await;
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                if let PublishError::MaxRetriesExceeded { attempts, .. } = &err {
                    attempt.retries = *attempts;
                }
                return Err(err);
            }
        };

        attempt.retries = outcome.retries;
        attempt.succeed(commit.sha.clone());

        Ok(CommitResult {
            url: api.repository().commit_url(&commit.sha),
            sha: commit.sha,
            retries: outcome.retries,
        })
    }
}

fn validate_request(branch: &str, message: &str) -> Result<(), PublishError> {
    if branch.trim().is_empty() {
        return Err(PublishError::Validation("branch is required".into()));
    }
    if message.trim().is_empty() {
        return Err(PublishError::Validation("commit message is required".into()));
    }
    Ok(())
}

/// Drop uncommittable changes, warning once per drop.
fn filter_files(files: &[FileChange]) -> Result<Vec<FileChange>, PublishError> {
    let (kept, dropped) = partition_files(files);
    for file in &dropped {
        warn!(path = %file.path, "skipping file change with empty path or content");
    }
    if kept.is_empty() {
        return Err(PublishError::NoValidFiles);
    }
    Ok(kept)
}

/// Find the commit and tree the new commit is built on.
pub async fn resolve_base(
    api: &dyn GitData,
    branch: &str,
    default_branch: &str,
) -> Result<BranchState, PublishError> {
    match api.get_ref(branch).await {
        Ok(head) => {
            let commit = api.get_commit(&head.sha).await?;
            return Ok(BranchState {
                exists: true,
                tip_commit_sha: head.sha,
                tip_tree_sha: commit.tree_sha,
            });
        }
        Err(err) if is_absent(&err) => {}
        Err(err) => return Err(err.into()),
    }

    let empty = || PublishError::EmptyRepository {
        branch: branch.to_string(),
    };
    if branch == default_branch {
        return Err(empty());
    }

    let head = match api.get_ref(default_branch).await {
        Ok(head) => head,
        Err(err) if is_absent(&err) => return Err(empty()),
        Err(err) => return Err(err.into()),
    };
    let commit = api.get_commit(&head.sha).await?;
    debug!(branch, default_branch, "branch absent, basing on default branch");

    Ok(BranchState {
        exists: false,
        tip_commit_sha: head.sha,
        tip_tree_sha: commit.tree_sha,
    })
}

/// A ref lookup that found nothing. GitHub answers 409 for any ref of a
/// repository without commits.
fn is_absent(err: &ForgeError) -> bool {
    err.is_not_found() || err.status() == Some(409)
}

/// Wire shape of a publish result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl From<&Result<CommitResult, PublishError>> for PublishOutcome {
    fn from(result: &Result<CommitResult, PublishError>) -> Self {
        match result {
            Ok(done) => PublishOutcome {
                success: true,
                sha: Some(done.sha.clone()),
                url: Some(done.url.clone()),
                message: Some(done.message()),
                error: None,
                error_kind: None,
            },
            Err(err) => PublishOutcome {
                success: false,
                sha: None,
                url: None,
                message: None,
                error: Some(err.to_string()),
                error_kind: Some(err.kind().to_string()),
            },
        }
    }
}
