//! engine::ref_update
//!
//! Moves a branch to a freshly built commit, tolerating concurrent writers.
//!
//! # States
//!
//! ```text
//!              ref exists            2xx
//!  Checking ─────────────▶ Updating ─────▶ Succeeded
//!     │  ▲                    │
//!     │  └── not fast-forward, retries left (sleep base * n)
//!     │                       │
//!     │ 404                   └── not fast-forward, no retries left ─▶ Failed(MaxRetriesExceeded)
//!     ▼            2xx
//!  Creating ─────────────▶ Succeeded
//! ```
//!
//! Any other error in any state ends in `Failed(Api)`. The ref is re-read
//! right before every update because another writer may have moved it
//! since the base was resolved. The commit being published is never
//! rebuilt here; only the pointer update is contended.

use tracing::{debug, warn};

use super::error::PublishError;
use super::retry::{RetryPolicy, Sleeper};
use crate::forge::GitData;

/// State of a ref update.
#[derive(Debug)]
pub enum RefUpdateState {
    Checking,
    Updating,
    Creating,
    Succeeded,
    Failed(PublishError),
}

impl RefUpdateState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RefUpdateState::Succeeded | RefUpdateState::Failed(_))
    }
}

/// How a successful ref update went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefUpdateOutcome {
    /// The branch did not exist and was created
    pub created: bool,
    /// Fast-forward rejections absorbed before success
    pub retries: u32,
}

/// One ref update run.
pub struct RefUpdate<'a> {
    api: &'a dyn GitData,
    sleeper: &'a dyn Sleeper,
    policy: RetryPolicy,
    branch: &'a str,
    sha: &'a str,
    retries: u32,
    created: bool,
}

impl<'a> RefUpdate<'a> {
    pub fn new(
        api: &'a dyn GitData,
        sleeper: &'a dyn Sleeper,
        policy: RetryPolicy,
        branch: &'a str,
        sha: &'a str,
    ) -> Self {
        Self {
            api,
            sleeper,
            policy,
            branch,
            sha,
            retries: 0,
            created: false,
        }
    }

    /// Drive the machine from `Checking` to a terminal state.
    pub async fn run(mut self) -> Result<RefUpdateOutcome, PublishError> {
        let mut state = RefUpdateState::Checking;
        while !state.is_terminal() {
            state = self.step(state).await;
        }

        match state {
            RefUpdateState::Failed(err) => Err(err),
            _ => Ok(RefUpdateOutcome {
                created: self.created,
                retries: self.retries,
            }),
        }
    }

    /// Perform the work of `state` and return the next state.
    pub async fn step(&mut self, state: RefUpdateState) -> RefUpdateState {
        match state {
            RefUpdateState::Checking => match self.api.get_ref(self.branch).await {
                Ok(current) => {
                    debug!(branch = self.branch, current = %current.sha, "ref exists, updating");
                    RefUpdateState::Updating
                }
                Err(err) if err.is_not_found() => {
                    debug!(branch = self.branch, "ref absent, creating");
                    RefUpdateState::Creating
                }
                Err(err) => RefUpdateState::Failed(err.into()),
            },

            RefUpdateState::Updating => {
                match self.api.update_ref(self.branch, self.sha, false).await {
                    Ok(_) => RefUpdateState::Succeeded,
                    Err(err) if err.is_not_fast_forward() => {
                        self.retries += 1;
                        if self.policy.allows_retry(self.retries) {
                            let delay = self.policy.delay_for(self.retries);
                            warn!(
                                branch = self.branch,
                                retry = self.retries,
                                delay_ms = delay.as_millis() as u64,
                                "ref update was not a fast forward, retrying"
                            );
                            self.sleeper.sleep(delay).await;
                            RefUpdateState::Checking
                        } else {
                            RefUpdateState::Failed(PublishError::MaxRetriesExceeded {
                                attempts: self.retries,
                                message: err.to_string(),
                            })
                        }
                    }
                    Err(err) => RefUpdateState::Failed(err.into()),
                }
            }

            RefUpdateState::Creating => match self.api.create_ref(self.branch, self.sha).await {
                Ok(_) => {
                    self.created = true;
                    RefUpdateState::Succeeded
                }
                Err(err) => RefUpdateState::Failed(err.into()),
            },

            terminal => terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::types::RepositoryRef;
    use crate::engine::retry::RecordingSleeper;
    use crate::forge::mock::{not_fast_forward, MockCall, MockGitData, MockOperation};
    use crate::forge::ForgeError;

    fn repo() -> RepositoryRef {
        RepositoryRef::new("owner", "repo").unwrap()
    }

    /// `main` at its first commit, plus a child commit one step ahead of it.
    async fn fast_forward_fixture() -> (MockGitData, String) {
        let api = MockGitData::with_initial_commit(repo(), "main", &[("a.txt", "a")]);
        let tip = api.ref_sha("main").unwrap();
        let child = api.seed_commit("main", "child", &[("b.txt", "b")]);
        api.update_ref("main", &tip, true).await.unwrap();
        api.clear_operations();
        (api, child)
    }

    #[tokio::test]
    async fn updates_existing_ref() {
        let (api, child) = fast_forward_fixture().await;
        let sleeper = RecordingSleeper::new();

        let outcome = RefUpdate::new(&api, &sleeper, RetryPolicy::default(), "main", &child)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, RefUpdateOutcome { created: false, retries: 0 });
        assert_eq!(api.ref_sha("main").unwrap(), child);
        assert!(sleeper.delays().is_empty());
        assert_eq!(
            api.operations(),
            vec![
                MockOperation::GetRef { branch: "main".into() },
                MockOperation::UpdateRef {
                    branch: "main".into(),
                    sha: child.clone(),
                    force: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn creates_absent_ref() {
        let api = MockGitData::with_initial_commit(repo(), "main", &[("a.txt", "a")]);
        let tip = api.ref_sha("main").unwrap();
        let sleeper = RecordingSleeper::new();

        let outcome = RefUpdate::new(&api, &sleeper, RetryPolicy::default(), "feature", &tip)
            .run()
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(api.ref_sha("feature").unwrap(), tip);
        assert_eq!(api.count(MockCall::UpdateRef), 0);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let (api, child) = fast_forward_fixture().await;
        let api = api.fail_times(MockCall::UpdateRef, not_fast_forward(), 2);
        let sleeper = RecordingSleeper::new();

        let outcome = RefUpdate::new(&api, &sleeper, RetryPolicy::default(), "main", &child)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.retries, 2);
        assert_eq!(api.count(MockCall::UpdateRef), 3);
        assert_eq!(api.count(MockCall::GetRef), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[tokio::test]
    async fn gives_up_after_three_rejections() {
        let (api, child) = fast_forward_fixture().await;
        let api = api.fail_on(MockCall::UpdateRef, not_fast_forward());
        let sleeper = RecordingSleeper::new();

        let err = RefUpdate::new(&api, &sleeper, RetryPolicy::default(), "main", &child)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PublishError::MaxRetriesExceeded { attempts: 3, .. }
        ));
        assert_eq!(api.count(MockCall::UpdateRef), 3);
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[tokio::test]
    async fn other_update_errors_are_fatal() {
        let (api, child) = fast_forward_fixture().await;
        let api = api.fail_on(
            MockCall::UpdateRef,
            ForgeError::ApiError {
                status: 500,
                message: "boom".into(),
            },
        );
        let sleeper = RecordingSleeper::new();

        let err = RefUpdate::new(&api, &sleeper, RetryPolicy::default(), "main", &child)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Api(_)));
        assert_eq!(api.count(MockCall::UpdateRef), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn check_errors_other_than_not_found_are_fatal() {
        let (api, child) = fast_forward_fixture().await;
        let api = api.fail_on(MockCall::GetRef, ForgeError::RateLimited("slow down".into()));
        let sleeper = RecordingSleeper::new();

        let err = RefUpdate::new(&api, &sleeper, RetryPolicy::default(), "main", &child)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Api(ForgeError::RateLimited(_))));
        assert_eq!(api.count(MockCall::UpdateRef), 0);
    }

    #[tokio::test]
    async fn step_leaves_terminal_states_alone() {
        let (api, child) = fast_forward_fixture().await;
        let sleeper = RecordingSleeper::new();
        let mut update = RefUpdate::new(&api, &sleeper, RetryPolicy::default(), "main", &child);

        let state = update.step(RefUpdateState::Succeeded).await;
        assert!(matches!(state, RefUpdateState::Succeeded));
        assert!(api.operations().is_empty());
    }
}
