//! core::types
//!
//! Strong types for the commit-publishing domain.
//!
//! # Types
//!
//! - [`RepositoryRef`] - GitHub `owner/name` pair parsed from a URL
//! - [`FileChange`] - Full replacement content for one file
//! - [`TreeEntry`] - A blob entry in a tree being built
//! - [`BranchState`] - The base a commit is built on
//! - [`CommitAttempt`] - Attempt-scoped record of one publish cycle
//! - [`CommitResult`] - What a successful publish returns
//!
//! # Validation
//!
//! [`RepositoryRef`] is validated at construction time, so a malformed
//! repository URL is rejected before any request is built.
//!
//! # Examples
//!
//! ```
//! use autocommitter::core::types::RepositoryRef;
//!
//! let repo = RepositoryRef::parse("https://github.com/octocat/hello-world.git").unwrap();
//! assert_eq!(repo.owner(), "octocat");
//! assert_eq!(repo.name(), "hello-world");
//!
//! assert!(RepositoryRef::parse("not-a-url").is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid repository URL '{0}': use https://github.com/owner/repo")]
    InvalidRepositoryUrl(String),

    #[error("invalid repository: {0}")]
    InvalidRepository(String),
}

/// A GitHub repository identified by owner and name.
///
/// Both parts are non-empty and contain no `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    owner: String,
    name: String,
}

impl RepositoryRef {
    /// Create a repository reference from its parts.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRepository` if either part is empty or
    /// contains a path separator.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, TypeError> {
        let owner = owner.into();
        let name = name.into();

        for (label, value) in [("owner", &owner), ("name", &name)] {
            if value.is_empty() {
                return Err(TypeError::InvalidRepository(format!(
                    "{} cannot be empty",
                    label
                )));
            }
            if value.contains('/') || value.chars().any(char::is_whitespace) {
                return Err(TypeError::InvalidRepository(format!(
                    "{} '{}' contains invalid characters",
                    label, value
                )));
            }
        }

        Ok(Self { owner, name })
    }

    /// Parse a GitHub repository URL.
    ///
    /// Supported forms:
    /// - `https://github.com/owner/repo`
    /// - `https://github.com/owner/repo.git`
    /// - `http://github.com/owner/repo`
    /// - `git@github.com:owner/repo.git`
    ///
    /// A single trailing `/` is tolerated.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRepositoryUrl` for anything else.
    pub fn parse(url: &str) -> Result<Self, TypeError> {
        let invalid = || TypeError::InvalidRepositoryUrl(url.to_string());
        let trimmed = url.trim();

        let rest = trimmed
            .strip_prefix("https://github.com/")
            .or_else(|| trimmed.strip_prefix("http://github.com/"))
            .or_else(|| trimmed.strip_prefix("git@github.com:"))
            .ok_or_else(invalid)?;

        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let rest = rest.strip_suffix(".git").unwrap_or(rest);

        let (owner, name) = rest.split_once('/').ok_or_else(invalid)?;
        Self::new(owner, name).map_err(|_| invalid())
    }

    /// Get the repository owner (user or organization).
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Web URL of a commit in this repository.
    pub fn commit_url(&self, sha: &str) -> String {
        format!("https://github.com/{}/{}/commit/{}", self.owner, self.name, sha)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A single file's full replacement content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the repository root
    pub path: String,
    /// UTF-8 file content
    pub content: String,
}

impl FileChange {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Whether this change can be committed (non-empty path and content).
    pub fn is_valid(&self) -> bool {
        !self.path.is_empty() && !self.content.is_empty()
    }
}

/// Regular (non-executable) file mode.
pub const FILE_MODE_REGULAR: &str = "100644";

/// An entry of a tree being created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

impl TreeEntry {
    /// Tree entry for a regular file blob.
    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: FILE_MODE_REGULAR.to_string(),
            kind: "blob".to_string(),
            sha: sha.into(),
        }
    }
}

/// The state a new commit is built on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchState {
    /// Whether the requested branch already exists
    pub exists: bool,
    /// Commit the new commit will use as its parent
    pub tip_commit_sha: String,
    /// Tree the new tree will use as its base
    pub tip_tree_sha: String,
}

/// Status of a commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::Pending => write!(f, "pending"),
            AttemptStatus::Success => write!(f, "success"),
            AttemptStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Record of one publish cycle.
///
/// Created when a cycle starts and filled in as each step completes.
/// Terminal once `status` is `Success` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAttempt {
    pub repository: RepositoryRef,
    pub branch: String,
    pub message: String,
    pub base_commit_sha: Option<String>,
    pub base_tree_sha: Option<String>,
    pub new_tree_sha: Option<String>,
    pub result_commit_sha: Option<String>,
    pub status: AttemptStatus,
    pub error: Option<String>,
    /// Number of fast-forward rejections absorbed by the ref update
    pub retries: u32,
}

impl CommitAttempt {
    pub fn new(
        repository: RepositoryRef,
        branch: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            branch: branch.into(),
            message: message.into(),
            base_commit_sha: None,
            base_tree_sha: None,
            new_tree_sha: None,
            result_commit_sha: None,
            status: AttemptStatus::Pending,
            error: None,
            retries: 0,
        }
    }

    /// Mark the attempt as failed.
    pub fn fail(&mut self, error: impl fmt::Display) {
        self.status = AttemptStatus::Failed;
        self.error = Some(error.to_string());
    }

    /// Mark the attempt as succeeded with the given commit.
    pub fn succeed(&mut self, sha: impl Into<String>) {
        self.status = AttemptStatus::Success;
        self.result_commit_sha = Some(sha.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.status != AttemptStatus::Pending
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    /// Sha of the new commit
    pub sha: String,
    /// Web URL of the new commit
    pub url: String,
    /// Fast-forward rejections absorbed before the ref update succeeded
    pub retries: u32,
}

impl CommitResult {
    /// Human-readable summary, annotated with the retry count when non-zero.
    pub fn message(&self) -> String {
        if self.retries > 0 {
            format!("Commit created successfully (after {} retries)", self.retries)
        } else {
            "Commit created successfully".to_string()
        }
    }

    /// First seven characters of the commit sha.
    pub fn short_sha(&self) -> &str {
        let end = 7.min(self.sha.len());
        &self.sha[..end]
    }
}

/// Keep only committable file changes, in their original order.
///
/// Returns the retained changes and the dropped ones.
pub fn partition_files(files: &[FileChange]) -> (Vec<FileChange>, Vec<FileChange>) {
    files.iter().cloned().partition(FileChange::is_valid)
}
