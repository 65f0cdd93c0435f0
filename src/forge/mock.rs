//! forge::mock
//!
//! In-memory Git Data implementation for deterministic testing.
//!
//! # Design
//!
//! The mock keeps blobs, trees, commits and branch refs in memory and
//! applies the same rules the remote service does where the publisher
//! depends on them:
//!
//! - trees are layered over their `base_tree`
//! - a non-forced ref update is refused unless the new commit descends
//!   from the current target ("Update is not a fast forward")
//! - refs of a missing branch answer `NotFound`
//!
//! Failures can be injected per call kind, and every call is recorded for
//! verification.
//!
//! # Example
//!
//! ```
//! use autocommitter::core::types::RepositoryRef;
//! use autocommitter::forge::mock::MockGitData;
//! use autocommitter::forge::GitData;
//!
//! # tokio_test::block_on(async {
//! let repo = RepositoryRef::new("octocat", "hello-world").unwrap();
//! let api = MockGitData::with_initial_commit(repo, "main", &[("README.md", "hi")]);
//!
//! let head = api.get_ref("main").await.unwrap();
//! let commit = api.get_commit(&head.sha).await.unwrap();
//! let tree = api.get_tree(&commit.tree_sha).await.unwrap();
//! assert!(tree.entry("README.md").is_some());
//! # });
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::traits::{
    BlobResult, CommitObject, CommitSummary, ForgeError, GitData, RefInfo, RepoInfo, TreeObject,
};
use crate::core::types::{RepositoryRef, TreeEntry};

/// Mock Git Data API for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockGitData {
    repository: RepositoryRef,
    inner: Arc<Mutex<MockInner>>,
}

/// Internal mutable state.
#[derive(Debug)]
struct MockInner {
    /// Whether the repository itself exists
    exists: bool,
    /// Declared default branch
    default_branch: Option<String>,
    /// Branch name -> commit sha
    refs: HashMap<String, String>,
    commits: HashMap<String, CommitObject>,
    /// Tree sha -> entries by path
    trees: HashMap<String, BTreeMap<String, TreeEntry>>,
    blobs: HashMap<String, String>,
    /// Counter for generated object ids
    next_object: u64,
    failures: Vec<Failure>,
    operations: Vec<MockOperation>,
}

/// Kind of API call, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    GetRepository,
    GetRef,
    GetCommit,
    CreateBlob,
    CreateTree,
    CreateCommit,
    UpdateRef,
    CreateRef,
    GetTree,
    GetBlob,
    LatestCommit,
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    GetRepository,
    GetRef { branch: String },
    GetCommit { sha: String },
    CreateBlob { content: String },
    CreateTree { base_tree: String, paths: Vec<String> },
    CreateCommit { message: String, tree: String, parents: Vec<String> },
    UpdateRef { branch: String, sha: String, force: bool },
    CreateRef { branch: String, sha: String },
    GetTree { sha: String },
    GetBlob { sha: String },
    LatestCommit { branch: String },
}

impl MockOperation {
    /// The call kind of this operation.
    pub fn call(&self) -> MockCall {
        match self {
            MockOperation::GetRepository => MockCall::GetRepository,
            MockOperation::GetRef { .. } => MockCall::GetRef,
            MockOperation::GetCommit { .. } => MockCall::GetCommit,
            MockOperation::CreateBlob { .. } => MockCall::CreateBlob,
            MockOperation::CreateTree { .. } => MockCall::CreateTree,
            MockOperation::CreateCommit { .. } => MockCall::CreateCommit,
            MockOperation::UpdateRef { .. } => MockCall::UpdateRef,
            MockOperation::CreateRef { .. } => MockCall::CreateRef,
            MockOperation::GetTree { .. } => MockCall::GetTree,
            MockOperation::GetBlob { .. } => MockCall::GetBlob,
            MockOperation::LatestCommit { .. } => MockCall::LatestCommit,
        }
    }
}

/// An injected failure.
#[derive(Debug, Clone)]
struct Failure {
    call: MockCall,
    error: ForgeError,
    /// `None` fails forever
    remaining: Option<u32>,
}

/// The rejection GitHub returns for a non-fast-forward ref update.
pub fn not_fast_forward() -> ForgeError {
    ForgeError::ApiError {
        status: 422,
        message: "Update is not a fast forward".into(),
    }
}

impl MockGitData {
    /// An existing repository with no commits and default branch `main`.
    pub fn new(repository: RepositoryRef) -> Self {
        Self {
            repository,
            inner: Arc::new(Mutex::new(MockInner {
                exists: true,
                default_branch: Some("main".to_string()),
                refs: HashMap::new(),
                commits: HashMap::new(),
                trees: HashMap::new(),
                blobs: HashMap::new(),
                next_object: 1,
                failures: Vec::new(),
                operations: Vec::new(),
            })),
        }
    }

    /// A repository whose `default_branch` holds one commit with `files`.
    pub fn with_initial_commit(
        repository: RepositoryRef,
        default_branch: &str,
        files: &[(&str, &str)],
    ) -> Self {
        let mock = Self::new(repository).with_default_branch(Some(default_branch));
        mock.seed_commit(default_branch, "Initial commit", files);
        mock
    }

    /// A repository that answers 404 to every lookup.
    pub fn missing(repository: RepositoryRef) -> Self {
        let mock = Self::new(repository);
        mock.lock().exists = false;
        mock
    }

    /// Set the declared default branch.
    pub fn with_default_branch(self, branch: Option<&str>) -> Self {
        self.lock().default_branch = branch.map(str::to_string);
        self
    }

    /// Fail every call of kind `call` with `error`.
    pub fn fail_on(self, call: MockCall, error: ForgeError) -> Self {
        self.lock().failures.push(Failure {
            call,
            error,
            remaining: None,
        });
        self
    }

    /// Fail the next `times` calls of kind `call` with `error`.
    pub fn fail_times(self, call: MockCall, error: ForgeError, times: u32) -> Self {
        self.lock().failures.push(Failure {
            call,
            error,
            remaining: Some(times),
        });
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    /// Number of recorded calls of kind `call`.
    pub fn count(&self, call: MockCall) -> usize {
        self.lock()
            .operations
            .iter()
            .filter(|op| op.call() == call)
            .count()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }

    /// Current target of `branch`, if the branch exists.
    pub fn ref_sha(&self, branch: &str) -> Option<String> {
        self.lock().refs.get(branch).cloned()
    }

    /// A stored commit (for test verification).
    pub fn commit(&self, sha: &str) -> Option<CommitObject> {
        self.lock().commits.get(sha).cloned()
    }

    /// Number of stored blobs.
    pub fn blob_count(&self) -> usize {
        self.lock().blobs.len()
    }

    /// Create a commit on `branch` directly, as another writer would.
    ///
    /// The commit's parent is the branch's current tip (if any) and its
    /// tree layers `files` over the tip's tree. Returns the new commit sha.
    pub fn seed_commit(&self, branch: &str, message: &str, files: &[(&str, &str)]) -> String {
        let mut inner = self.lock();

        let parent = inner.refs.get(branch).cloned();
        let mut entries = parent
            .as_ref()
            .and_then(|sha| inner.commits.get(sha))
            .and_then(|c| inner.trees.get(&c.tree_sha))
            .cloned()
            .unwrap_or_default();

        for (path, content) in files {
            let blob_sha = inner.next_sha();
            inner.blobs.insert(blob_sha.clone(), content.to_string());
            entries.insert(path.to_string(), TreeEntry::blob(*path, blob_sha));
        }

        let tree_sha = inner.next_sha();
        inner.trees.insert(tree_sha.clone(), entries);

        let commit_sha = inner.next_sha();
        inner.commits.insert(
            commit_sha.clone(),
            CommitObject {
                sha: commit_sha.clone(),
                tree_sha,
                parents: parent.into_iter().collect(),
                message: message.to_string(),
            },
        );
        inner.refs.insert(branch.to_string(), commit_sha.clone());
        commit_sha
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap()
    }

    /// Record `op`, then return an injected failure for it if one is armed.
    fn enter(&self, op: MockOperation) -> Result<MutexGuard<'_, MockInner>, ForgeError> {
        let mut inner = self.lock();
        let call = op.call();
        inner.operations.push(op);

        if let Some(index) = inner.failures.iter().position(|f| f.call == call) {
            let error = inner.failures[index].error.clone();
            let exhausted = match inner.failures[index].remaining.as_mut() {
                Some(remaining) => {
                    *remaining = remaining.saturating_sub(1);
                    *remaining == 0
                }
                None => false,
            };
            if exhausted {
                inner.failures.remove(index);
            }
            return Err(error);
        }

        if !inner.exists {
            return Err(ForgeError::NotFound("Not Found".into()));
        }
        Ok(inner)
    }
}

impl MockInner {
    fn next_sha(&mut self) -> String {
        let sha = format!("{:040x}", self.next_object);
        self.next_object += 1;
        sha
    }

    /// Whether `ancestor` is reachable from `descendant` through parents.
    fn descends_from(&self, descendant: &str, ancestor: &str) -> bool {
        let mut pending = vec![descendant.to_string()];
        let mut seen = HashSet::new();
        while let Some(sha) = pending.pop() {
            if sha == ancestor {
                return true;
            }
            if !seen.insert(sha.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&sha) {
                pending.extend(commit.parents.iter().cloned());
            }
        }
        false
    }

    fn ref_info(branch: &str, sha: &str) -> RefInfo {
        RefInfo {
            name: format!("refs/heads/{}", branch),
            sha: sha.to_string(),
        }
    }

    fn tree_object(&self, sha: &str) -> Option<TreeObject> {
        self.trees.get(sha).map(|entries| TreeObject {
            sha: sha.to_string(),
            entries: entries.values().cloned().collect(),
        })
    }
}

fn unprocessable(message: impl Into<String>) -> ForgeError {
    ForgeError::ApiError {
        status: 422,
        message: message.into(),
    }
}

#[async_trait]
impl GitData for MockGitData {
    fn repository(&self) -> &RepositoryRef {
        &self.repository
    }

    async fn get_repository(&self) -> Result<RepoInfo, ForgeError> {
        let inner = self.enter(MockOperation::GetRepository)?;
        Ok(RepoInfo {
            full_name: self.repository.to_string(),
            default_branch: inner.default_branch.clone(),
            private: false,
        })
    }

    async fn get_ref(&self, branch: &str) -> Result<RefInfo, ForgeError> {
        let inner = self.enter(MockOperation::GetRef {
            branch: branch.to_string(),
        })?;
        inner
            .refs
            .get(branch)
            .map(|sha| MockInner::ref_info(branch, sha))
            .ok_or_else(|| ForgeError::NotFound("Not Found".into()))
    }

    async fn get_commit(&self, sha: &str) -> Result<CommitObject, ForgeError> {
        let inner = self.enter(MockOperation::GetCommit {
            sha: sha.to_string(),
        })?;
        inner
            .commits
            .get(sha)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound("Not Found".into()))
    }

    async fn create_blob(&self, content: &str) -> Result<BlobResult, ForgeError> {
        let mut inner = self.enter(MockOperation::CreateBlob {
            content: content.to_string(),
        })?;
        let sha = inner.next_sha();
        inner.blobs.insert(sha.clone(), content.to_string());
        Ok(BlobResult { sha })
    }

    async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<TreeObject, ForgeError> {
        let mut inner = self.enter(MockOperation::CreateTree {
            base_tree: base_tree.to_string(),
            paths: entries.iter().map(|e| e.path.clone()).collect(),
        })?;

        let mut tree = inner
            .trees
            .get(base_tree)
            .cloned()
            .ok_or_else(|| unprocessable("base_tree is not a valid tree"))?;

        for entry in entries {
            if !inner.blobs.contains_key(&entry.sha) {
                return Err(unprocessable(format!(
                    "tree.sha {} is not a valid blob",
                    entry.sha
                )));
            }
            tree.insert(entry.path.clone(), entry.clone());
        }

        let sha = inner.next_sha();
        inner.trees.insert(sha.clone(), tree);
        inner
            .tree_object(&sha)
            .ok_or_else(|| unprocessable("tree vanished"))
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> Result<CommitObject, ForgeError> {
        let mut inner = self.enter(MockOperation::CreateCommit {
            message: message.to_string(),
            tree: tree.to_string(),
            parents: parents.to_vec(),
        })?;

        if !inner.trees.contains_key(tree) {
            return Err(unprocessable("Tree SHA does not exist"));
        }
        if let Some(missing) = parents.iter().find(|p| !inner.commits.contains_key(*p)) {
            return Err(unprocessable(format!("Parent SHA {} does not exist", missing)));
        }

        let sha = inner.next_sha();
        let commit = CommitObject {
            sha: sha.clone(),
            tree_sha: tree.to_string(),
            parents: parents.to_vec(),
            message: message.to_string(),
        };
        inner.commits.insert(sha, commit.clone());
        Ok(commit)
    }

    async fn update_ref(
        &self,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> Result<RefInfo, ForgeError> {
        let mut inner = self.enter(MockOperation::UpdateRef {
            branch: branch.to_string(),
            sha: sha.to_string(),
            force,
        })?;

        let current = inner
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| unprocessable("Reference does not exist"))?;
        if !inner.commits.contains_key(sha) {
            return Err(unprocessable("Object does not exist"));
        }
        if !force && !inner.descends_from(sha, &current) {
            return Err(not_fast_forward());
        }

        inner.refs.insert(branch.to_string(), sha.to_string());
        Ok(MockInner::ref_info(branch, sha))
    }

    async fn create_ref(&self, branch: &str, sha: &str) -> Result<RefInfo, ForgeError> {
        let mut inner = self.enter(MockOperation::CreateRef {
            branch: branch.to_string(),
            sha: sha.to_string(),
        })?;

        if inner.refs.contains_key(branch) {
            return Err(unprocessable("Reference already exists"));
        }
        if !inner.commits.contains_key(sha) {
            return Err(unprocessable("Object does not exist"));
        }

        inner.refs.insert(branch.to_string(), sha.to_string());
        Ok(MockInner::ref_info(branch, sha))
    }

    async fn get_tree(&self, sha: &str) -> Result<TreeObject, ForgeError> {
        let inner = self.enter(MockOperation::GetTree {
            sha: sha.to_string(),
        })?;
        inner
            .tree_object(sha)
            .ok_or_else(|| ForgeError::NotFound("Not Found".into()))
    }

    async fn get_blob(&self, sha: &str) -> Result<String, ForgeError> {
        let inner = self.enter(MockOperation::GetBlob {
            sha: sha.to_string(),
        })?;
        inner
            .blobs
            .get(sha)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound("Not Found".into()))
    }

    async fn latest_commit(&self, branch: &str) -> Result<CommitSummary, ForgeError> {
        let inner = self.enter(MockOperation::LatestCommit {
            branch: branch.to_string(),
        })?;
        let sha = inner
            .refs
            .get(branch)
            .ok_or_else(|| ForgeError::NotFound("Not Found".into()))?;
        let commit = inner
            .commits
            .get(sha)
            .ok_or_else(|| ForgeError::NotFound("Not Found".into()))?;
        Ok(CommitSummary {
            sha: commit.sha.clone(),
            message: commit.message.clone(),
            date: None,
        })
    }
}
