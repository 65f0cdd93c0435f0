//! forge::github
//!
//! GitHub implementation of [`GitData`] using the REST Git Data API.
//!
//! # Design
//!
//! One [`GitHubClient`] targets one repository with one token. Every request
//! carries the same header set and goes through a single response handler,
//! so status mapping and error-body decoding are uniform:
//!
//! - 2xx: body is decoded into a typed wire struct, then converted
//! - 404: `ForgeError::NotFound`
//! - 401: `ForgeError::AuthFailed`
//! - 429: `ForgeError::RateLimited`
//! - anything else, 403 included: `ForgeError::ApiError` with the body's `message`, or
//!   `"GitHub API error: <status>"` when the body does not parse
//!
//! # Timeouts
//!
//! Each call is bounded by the client timeout (30 seconds by default).
//! Expiry is reported as `ForgeError::Timeout`.
//!
//! # Example
//!
//! ```ignore
//! use autocommitter::core::types::RepositoryRef;
//! use autocommitter::forge::github::GitHubClient;
//! use autocommitter::forge::GitData;
//!
//! let repo = RepositoryRef::parse("https://github.com/octocat/hello-world")?;
//! let client = GitHubClient::new("ghp_xxx", repo)?;
//! let head = client.get_ref("main").await?;
//! println!("main is at {}", head.sha);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::traits::{
    BlobResult, CommitObject, CommitSummary, ForgeError, GitData, RefInfo, RepoInfo, TreeObject,
};
use crate::core::types::{RepositoryRef, TreeEntry};

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
pub const USER_AGENT_VALUE: &str = "autocommitter/0.1";

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the header set shared by every API request.
pub(crate) fn api_headers(token: &str) -> Result<HeaderMap, ForgeError> {
    let mut headers = HeaderMap::new();
    let auth = HeaderValue::from_str(&format!("token {}", token))
        .map_err(|_| ForgeError::AuthFailed("token contains invalid characters".into()))?;
    headers.insert(AUTHORIZATION, auth);
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers.insert(
        "X-GitHub-Api-Version",
        HeaderValue::from_static("2022-11-28"),
    );
    Ok(headers)
}

/// Build an HTTP client with the given per-call timeout.
pub(crate) fn http_client(timeout: Duration) -> Result<Client, ForgeError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ForgeError::NetworkError(e.to_string()))
}

/// Map a transport failure.
pub(crate) fn transport_error(err: reqwest::Error) -> ForgeError {
    if err.is_timeout() {
        ForgeError::Timeout(err.to_string())
    } else {
        ForgeError::NetworkError(err.to_string())
    }
}

/// Decode the `message` of an error body, falling back to the status code.
pub(crate) async fn error_message(response: Response, status: StatusCode) -> String {
    match response.json::<GitHubErrorResponse>().await {
        Ok(body) if !body.message.is_empty() => body.message,
        _ => format!("GitHub API error: {}", status.as_u16()),
    }
}

/// Map a non-success response to a `ForgeError`.
pub(crate) async fn error_from_response(response: Response) -> ForgeError {
    let status = response.status();
    let message = error_message(response, status).await;

    match status {
        StatusCode::NOT_FOUND => ForgeError::NotFound(message),
        StatusCode::UNAUTHORIZED => ForgeError::AuthFailed(message),
        StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited(message),
        _ => ForgeError::ApiError {
            status: status.as_u16(),
            message,
        },
    }
}

/// GitHub Git Data API client for one repository.
pub struct GitHubClient {
    /// HTTP client for making requests
    client: Client,
    /// Token sent with every request
    token: String,
    /// Target repository
    repository: RepositoryRef,
    /// API base URL (configurable for GitHub Enterprise and tests)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("repository", &self.repository)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Create a client against `api.github.com` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::NetworkError` if the HTTP client cannot be built.
    pub fn new(token: impl Into<String>, repository: RepositoryRef) -> Result<Self, ForgeError> {
        Self::with_options(token, repository, DEFAULT_API_BASE, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom API base URL and per-call timeout.
    pub fn with_options(
        token: impl Into<String>,
        repository: RepositoryRef,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ForgeError> {
        let api_base: String = api_base.into();
        Ok(Self {
            client: http_client(timeout)?,
            token: token.into(),
            repository,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Build URL for a repository endpoint. An empty path addresses the
    /// repository itself.
    fn repo_url(&self, path: &str) -> String {
        let base = format!(
            "{}/repos/{}/{}",
            self.api_base,
            self.repository.owner(),
            self.repository.name()
        );
        if path.is_empty() {
            base
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Send a request and decode a successful response body.
    async fn execute<B, T>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<T, ForgeError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self
            .client
            .request(method.clone(), url)
            .headers(api_headers(&self.token)?);
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, url, "github request");
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            let err = error_from_response(response).await;
            tracing::debug!(
                %method,
                url,
                status = status.as_u16(),
                error = %err,
                "github request failed"
            );
            Err(err)
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ForgeError> {
        self.execute::<(), T>(Method::GET, url, None).await
    }
}

#[async_trait]
impl GitData for GitHubClient {
    fn repository(&self) -> &RepositoryRef {
        &self.repository
    }

    async fn get_repository(&self) -> Result<RepoInfo, ForgeError> {
        let repo: GitHubRepository = self.get(&self.repo_url("")).await?;
        Ok(repo.into())
    }

    async fn get_ref(&self, branch: &str) -> Result<RefInfo, ForgeError> {
        let url = self.repo_url(&format!("git/refs/heads/{}", branch));
        let lookup: GitHubRefLookup = self.get(&url).await?;
        lookup
            .exact(branch)
            .map(Into::into)
            .ok_or_else(|| ForgeError::NotFound(format!("no ref named refs/heads/{}", branch)))
    }

    async fn get_commit(&self, sha: &str) -> Result<CommitObject, ForgeError> {
        let url = self.repo_url(&format!("git/commits/{}", sha));
        let commit: GitHubCommit = self.get(&url).await?;
        Ok(commit.into())
    }

    async fn create_blob(&self, content: &str) -> Result<BlobResult, ForgeError> {
        let body = CreateBlobBody {
            content,
            encoding: "utf-8",
        };
        let created: GitHubSha = self
            .execute(Method::POST, &self.repo_url("git/blobs"), Some(&body))
            .await?;
        Ok(BlobResult { sha: created.sha })
    }

    async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<TreeObject, ForgeError> {
        let body = CreateTreeBody {
            base_tree,
            tree: entries,
        };
        let tree: GitHubTree = self
            .execute(Method::POST, &self.repo_url("git/trees"), Some(&body))
            .await?;
        Ok(tree.into())
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> Result<CommitObject, ForgeError> {
        let body = CreateCommitBody {
            message,
            tree,
            parents,
        };
        let commit: GitHubCommit = self
            .execute(Method::POST, &self.repo_url("git/commits"), Some(&body))
            .await?;
        Ok(commit.into())
    }

    async fn update_ref(
        &self,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> Result<RefInfo, ForgeError> {
        let url = self.repo_url(&format!("git/refs/heads/{}", branch));
        let body = UpdateRefBody { sha, force };
        let git_ref: GitHubRef = self.execute(Method::PATCH, &url, Some(&body)).await?;
        Ok(git_ref.into())
    }

    async fn create_ref(&self, branch: &str, sha: &str) -> Result<RefInfo, ForgeError> {
        let body = CreateRefBody {
            ref_name: format!("refs/heads/{}", branch),
            sha,
        };
        let git_ref: GitHubRef = self
            .execute(Method::POST, &self.repo_url("git/refs"), Some(&body))
            .await?;
        Ok(git_ref.into())
    }

    async fn get_tree(&self, sha: &str) -> Result<TreeObject, ForgeError> {
        let url = self.repo_url(&format!("git/trees/{}?recursive=1", sha));
        let tree: GitHubTree = self.get(&url).await?;
        Ok(tree.into())
    }

    async fn get_blob(&self, sha: &str) -> Result<String, ForgeError> {
        let url = self.repo_url(&format!("git/blobs/{}", sha));
        let blob: GitHubBlob = self.get(&url).await?;
        blob.decode()
    }

    async fn latest_commit(&self, branch: &str) -> Result<CommitSummary, ForgeError> {
        let url = self.repo_url(&format!("commits?sha={}&per_page=1", branch));
        let commits: Vec<GitHubCommitListItem> = self.get(&url).await?;
        commits
            .into_iter()
            .next()
            .map(Into::into)
            .ok_or_else(|| ForgeError::NotFound(format!("no commits on branch '{}'", branch)))
    }
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

/// Request body for creating a blob.
#[derive(Serialize)]
struct CreateBlobBody<'a> {
    content: &'a str,
    encoding: &'a str,
}

/// Request body for creating a tree.
#[derive(Serialize)]
struct CreateTreeBody<'a> {
    base_tree: &'a str,
    tree: &'a [TreeEntry],
}

/// Request body for creating a commit.
#[derive(Serialize)]
struct CreateCommitBody<'a> {
    message: &'a str,
    tree: &'a str,
    parents: &'a [String],
}

/// Request body for moving a ref.
#[derive(Serialize)]
struct UpdateRefBody<'a> {
    sha: &'a str,
    force: bool,
}

/// Request body for creating a ref.
#[derive(Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: &'a str,
}

/// GitHub error response format.
#[derive(Deserialize)]
pub(crate) struct GitHubErrorResponse {
    #[serde(default)]
    message: String,
}

/// GitHub repository response (subset).
#[derive(Deserialize)]
struct GitHubRepository {
    full_name: String,
    default_branch: Option<String>,
    #[serde(default)]
    private: bool,
}

/// Any object addressed only by sha.
#[derive(Deserialize)]
struct GitHubSha {
    sha: String,
}

/// GitHub ref response.
#[derive(Deserialize)]
struct GitHubRef {
    #[serde(rename = "ref")]
    ref_name: String,
    object: GitHubSha,
}

/// Answer of `GET git/refs/heads/{branch}`.
///
/// Without an exact match GitHub answers 200 with every ref that has the
/// requested name as a prefix.
#[derive(Deserialize)]
#[serde(untagged)]
enum GitHubRefLookup {
    One(GitHubRef),
    Many(Vec<GitHubRef>),
}

impl GitHubRefLookup {
    /// The ref named exactly `refs/heads/{branch}`, if present.
    fn exact(self, branch: &str) -> Option<GitHubRef> {
        let wanted = format!("refs/heads/{}", branch);
        match self {
            GitHubRefLookup::One(git_ref) => Some(git_ref).filter(|r| r.ref_name == wanted),
            GitHubRefLookup::Many(refs) => refs.into_iter().find(|r| r.ref_name == wanted),
        }
    }
}

/// GitHub git commit response.
#[derive(Deserialize)]
struct GitHubCommit {
    sha: String,
    tree: GitHubSha,
    #[serde(default)]
    parents: Vec<GitHubSha>,
    #[serde(default)]
    message: String,
}

/// GitHub tree response.
#[derive(Deserialize)]
struct GitHubTree {
    sha: String,
    #[serde(default)]
    tree: Vec<GitHubTreeItem>,
}

/// One entry of a tree response.
#[derive(Deserialize)]
struct GitHubTreeItem {
    path: String,
    mode: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
}

/// GitHub blob response.
#[derive(Deserialize)]
struct GitHubBlob {
    content: String,
    encoding: String,
}

impl GitHubBlob {
    /// Decode the blob body to text.
    fn decode(self) -> Result<String, ForgeError> {
        let invalid = |detail: String| ForgeError::ApiError {
            status: 200,
            message: format!("Failed to decode blob: {}", detail),
        };

        match self.encoding.as_str() {
            "base64" => {
                let compact: String = self
                    .content
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(compact)
                    .map_err(|e| invalid(e.to_string()))?;
                String::from_utf8(bytes).map_err(|e| invalid(e.to_string()))
            }
            "utf-8" | "utf8" => Ok(self.content),
            other => Err(invalid(format!("unsupported encoding '{}'", other))),
        }
    }
}

/// Item of the commits list endpoint (subset).
#[derive(Deserialize)]
struct GitHubCommitListItem {
    sha: String,
    commit: GitHubCommitDetail,
}

#[derive(Deserialize)]
struct GitHubCommitDetail {
    message: String,
    committer: Option<GitHubSignature>,
}

#[derive(Deserialize)]
struct GitHubSignature {
    date: Option<String>,
}

impl From<GitHubRepository> for RepoInfo {
    fn from(repo: GitHubRepository) -> Self {
        RepoInfo {
            full_name: repo.full_name,
            default_branch: repo.default_branch,
            private: repo.private,
        }
    }
}

impl From<GitHubRef> for RefInfo {
    fn from(git_ref: GitHubRef) -> Self {
        RefInfo {
            name: git_ref.ref_name,
            sha: git_ref.object.sha,
        }
    }
}

impl From<GitHubCommit> for CommitObject {
    fn from(commit: GitHubCommit) -> Self {
        CommitObject {
            sha: commit.sha,
            tree_sha: commit.tree.sha,
            parents: commit.parents.into_iter().map(|p| p.sha).collect(),
            message: commit.message,
        }
    }
}

impl From<GitHubTree> for TreeObject {
    fn from(tree: GitHubTree) -> Self {
        TreeObject {
            sha: tree.sha,
            entries: tree
                .tree
                .into_iter()
                .map(|item| TreeEntry {
                    path: item.path,
                    mode: item.mode,
                    kind: item.kind,
                    sha: item.sha,
                })
                .collect(),
        }
    }
}

impl From<GitHubCommitListItem> for CommitSummary {
    fn from(item: GitHubCommitListItem) -> Self {
        CommitSummary {
            sha: item.sha,
            message: item.commit.message,
            date: item.commit.committer.and_then(|c| c.date),
        }
    }
}
