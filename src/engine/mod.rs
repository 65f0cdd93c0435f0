//! engine
//!
//! Publishing commits through the Git Data API.
//!
//! # Architecture
//!
//! A publish attempt is a strictly ordered sequence of remote steps:
//!
//! ```text
//! Validate -> Repository -> Base state -> Blobs -> Tree -> Commit -> Ref update
//! ```
//!
//! Only the last step is contended. Another writer may move the branch
//! between base resolution and the ref update, so the update runs as an
//! explicit state machine with bounded, linear backoff.
//!
//! # Modules
//!
//! - [`publisher`]: The attempt sequence and `CommitPublisher`
//! - [`ref_update`]: Check/update/create state machine for the branch ref
//! - [`retry`]: Backoff policy and the injectable `Sleeper`
//! - [`error`]: `PublishError` taxonomy
//! - [`changes`]: Change detection against a known commit
//! - [`scheduler`]: Timer-driven batches over many repositories
//!
//! # Invariants
//!
//! - Input is validated before any request is made
//! - Blobs, tree and commit are built once per attempt and never rebuilt
//! - The new commit's only parent is the base resolved for the attempt
//! - A ref update is attempted at most `RetryPolicy::max_attempts` times

pub mod changes;
pub mod error;
pub mod publisher;
pub mod ref_update;
pub mod retry;
pub mod scheduler;

pub use error::PublishError;
pub use publisher::{CommitPublisher, PublishOutcome};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use scheduler::{CancelFlag, ScheduleSettings, Scheduler};
