//! engine::error
//!
//! Failure taxonomy of a publish attempt.
//!
//! Every variant except `Api` is something the caller can act on without
//! reading a status code: fix the input, seed the repository, or back off
//! before the next scheduled attempt.

use thiserror::Error;

use crate::core::types::TypeError;
use crate::forge::ForgeError;

/// Errors from publishing a commit.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Caller-fixable input problem, detected before any request.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Every file change was dropped by validation.
    #[error("no valid files provided for commit")]
    NoValidFiles,

    /// The repository lookup answered 404.
    #[error("repository '{0}' not found or not accessible; check the URL and token permissions")]
    RepositoryNotFound(String),

    /// Neither the branch nor the default branch has a commit to build on.
    #[error(
        "branch '{branch}' not found and repository appears to be empty; create an initial commit first"
    )]
    EmptyRepository { branch: String },

    /// Any other non-success answer from the API.
    #[error(transparent)]
    Api(#[from] ForgeError),

    /// The ref update lost the fast-forward race on every attempt.
    #[error("failed to update branch after {attempts} retries: {message}")]
    MaxRetriesExceeded { attempts: u32, message: String },
}

impl From<TypeError> for PublishError {
    fn from(err: TypeError) -> Self {
        PublishError::Validation(err.to_string())
    }
}

impl PublishError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::Validation(_) => "validation",
            PublishError::NoValidFiles => "no_valid_files",
            PublishError::RepositoryNotFound(_) => "repository_not_found",
            PublishError::EmptyRepository { .. } => "empty_repository",
            PublishError::Api(_) => "api",
            PublishError::MaxRetriesExceeded { .. } => "max_retries_exceeded",
        }
    }

    /// HTTP status behind the failure, when there is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            PublishError::Api(err) => err.status(),
            PublishError::RepositoryNotFound(_) | PublishError::EmptyRepository { .. } => {
                Some(404)
            }
            PublishError::MaxRetriesExceeded { .. } => Some(422),
            PublishError::Validation(_) | PublishError::NoValidFiles => None,
        }
    }

    /// Whether the failure was detected locally, before any request.
    pub fn is_validation(&self) -> bool {
        matches!(self, PublishError::Validation(_) | PublishError::NoValidFiles)
    }
}
