//! forge::traits
//!
//! The Git Data API surface used to build commits remotely.
//!
//! # Design
//!
//! The `GitData` trait is async because every operation is a network call.
//! An implementation is scoped to one repository and one credential, the
//! same way a remote client is constructed once per target. All methods
//! return `Result` so the publisher can decide which failures are fatal.
//!
//! # Example
//!
//! ```ignore
//! use autocommitter::forge::{GitData, ForgeError};
//!
//! async fn tip_of(api: &dyn GitData, branch: &str) -> Result<String, ForgeError> {
//!     let head = api.get_ref(branch).await?;
//!     let commit = api.get_commit(&head.sha).await?;
//!     Ok(commit.tree_sha)
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::{RepositoryRef, TreeEntry};

/// Errors from Git Data API operations.
///
/// These map the failure modes of the remote service. The message of an
/// `ApiError` is the `message` field of the error body when it parses,
/// otherwise a generic text carrying the status code.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// The token was not accepted (401).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded (429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// The request did not complete within the per-call timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ForgeError {
    /// HTTP status behind this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ForgeError::AuthFailed(_) => Some(401),
            ForgeError::NotFound(_) => Some(404),
            ForgeError::RateLimited(_) => Some(429),
            ForgeError::ApiError { status, .. } => Some(*status),
            ForgeError::Timeout(_) | ForgeError::NetworkError(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ForgeError::NotFound(_))
    }

    /// Whether a ref update was refused because it is not a fast-forward.
    ///
    /// GitHub answers `422 Update is not a fast forward` in that case.
    pub fn is_not_fast_forward(&self) -> bool {
        match self {
            ForgeError::ApiError { message, .. } => {
                message.to_ascii_lowercase().contains("fast forward")
            }
            _ => false,
        }
    }
}

/// Repository metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    /// `owner/name` as reported by the server
    pub full_name: String,
    /// Declared default branch (absent for some empty repositories)
    pub default_branch: Option<String>,
    pub private: bool,
}

/// A branch ref and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefInfo {
    /// Full ref name, e.g. `refs/heads/main`
    pub name: String,
    /// Target commit sha
    pub sha: String,
}

/// A commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitObject {
    pub sha: String,
    pub tree_sha: String,
    pub parents: Vec<String>,
    pub message: String,
}

/// A created blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobResult {
    pub sha: String,
}

/// A tree object, with its entries when they were requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeObject {
    pub sha: String,
    pub entries: Vec<TreeEntry>,
}

impl TreeObject {
    /// Find the entry at `path`.
    pub fn entry(&self, path: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.path == path)
    }
}

/// Latest commit on a branch, as listed by the commits endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
    /// Committer date (RFC3339)
    pub date: Option<String>,
}

/// Git Data API operations against a single repository.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// Every method returns `ForgeError::NotFound` for a 404 so callers can
/// branch on absence (missing branch, missing repository) without
/// inspecting status codes.
#[async_trait]
pub trait GitData: Send + Sync {
    /// The repository this client targets.
    fn repository(&self) -> &RepositoryRef;

    /// `GET /repos/{owner}/{repo}`
    async fn get_repository(&self) -> Result<RepoInfo, ForgeError>;

    /// `GET /repos/{owner}/{repo}/git/refs/heads/{branch}`
    async fn get_ref(&self, branch: &str) -> Result<RefInfo, ForgeError>;

    /// `GET /repos/{owner}/{repo}/git/commits/{sha}`
    async fn get_commit(&self, sha: &str) -> Result<CommitObject, ForgeError>;

    /// `POST /repos/{owner}/{repo}/git/blobs` with UTF-8 encoding.
    async fn create_blob(&self, content: &str) -> Result<BlobResult, ForgeError>;

    /// `POST /repos/{owner}/{repo}/git/trees`
    ///
    /// Entries are layered over `base_tree`; paths not listed keep their
    /// base content.
    async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<TreeObject, ForgeError>;

    /// `POST /repos/{owner}/{repo}/git/commits`
    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> Result<CommitObject, ForgeError>;

    /// `PATCH /repos/{owner}/{repo}/git/refs/heads/{branch}`
    ///
    /// With `force = false` the server rejects non-fast-forward updates
    /// (see [`ForgeError::is_not_fast_forward`]).
    async fn update_ref(&self, branch: &str, sha: &str, force: bool)
        -> Result<RefInfo, ForgeError>;

    /// `POST /repos/{owner}/{repo}/git/refs` for `refs/heads/{branch}`.
    async fn create_ref(&self, branch: &str, sha: &str) -> Result<RefInfo, ForgeError>;

    /// `GET /repos/{owner}/{repo}/git/trees/{sha}?recursive=1`
    async fn get_tree(&self, sha: &str) -> Result<TreeObject, ForgeError>;

    /// `GET /repos/{owner}/{repo}/git/blobs/{sha}`, decoded to text.
    async fn get_blob(&self, sha: &str) -> Result<String, ForgeError>;

    /// `GET /repos/{owner}/{repo}/commits?sha={branch}&per_page=1`
    async fn latest_commit(&self, branch: &str) -> Result<CommitSummary, ForgeError>;
}
