//! engine::scheduler
//!
//! Timer-driven publishing to a list of repositories.
//!
//! # Cycle
//!
//! ```text
//! run:   validate token once -> [ batch -> wait interval ]* until cancelled
//! batch: for each target, in order: generate content -> publish -> record
//! ```
//!
//! Targets within a batch are published one after another with a pause
//! between them. The cancellation flag is checked before every publish and
//! interrupts the waits; a publish already in flight runs to completion.
//! A failed publish is recorded and the schedule goes on.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::publisher::CommitPublisher;
use crate::auth::TokenValidator;
use crate::core::config::{Config, Target};
use crate::core::content::{generate, ContentContext, ContentKind, DEFAULT_CUSTOM_PATH};
use crate::core::log::{BotStats, CommitLog, LogSink, TracingSink};
use crate::forge::ForgeError;

/// Errors that stop the scheduler before it starts.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no active repositories to publish to")]
    NoTargets,

    #[error("token rejected: {0}")]
    InvalidToken(String),

    #[error("token check failed: {0}")]
    TokenCheck(#[from] ForgeError),
}

/// Cooperative cancellation shared between the scheduler and its owner.
///
/// Clones share the flag.
#[derive(Debug, Clone)]
pub struct CancelFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelFlag {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the flag is set.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `duration` unless cancelled first. Returns `false` when
    /// cancelled.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_cancelled();
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_cancelled(),
            _ = self.cancelled() => false,
        }
    }
}

/// What and how often to publish.
#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub interval: Duration,
    pub inter_repo_delay: Duration,
    pub kind: ContentKind,
    /// Message prefix; a timestamp is appended per commit
    pub message: String,
    pub custom_path: String,
    pub custom_template: Option<String>,
    /// Stop after this many batches
    pub max_cycles: Option<u64>,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            inter_repo_delay: Duration::from_secs(1),
            kind: ContentKind::Simple,
            message: "Auto-commit: Update files".to_string(),
            custom_path: DEFAULT_CUSTOM_PATH.to_string(),
            custom_template: None,
            max_cycles: None,
        }
    }
}

impl ScheduleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.interval(),
            inter_repo_delay: config.inter_repo_delay(),
            kind: config.commit_type(),
            message: config.message().to_string(),
            custom_path: config.custom_path().to_string(),
            custom_template: config.custom_template().map(str::to_string),
            max_cycles: None,
        }
    }
}

/// Tally of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Targets not attempted because of cancellation
    pub skipped: usize,
}

/// Publishes generated content to each target on a timer.
pub struct Scheduler {
    publisher: CommitPublisher,
    token: String,
    targets: Vec<Target>,
    settings: ScheduleSettings,
    sink: Arc<dyn LogSink>,
    validator: Option<TokenValidator>,
    cancel: CancelFlag,
    stats: BotStats,
    cycles: u64,
}

impl Scheduler {
    pub fn new(
        publisher: CommitPublisher,
        token: impl Into<String>,
        targets: Vec<Target>,
        settings: ScheduleSettings,
    ) -> Self {
        Self {
            publisher,
            token: token.into(),
            targets,
            settings,
            sink: Arc::new(TracingSink),
            validator: None,
            cancel: CancelFlag::new(),
            stats: BotStats::default(),
            cycles: 0,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Check the token with `validator` before the first batch.
    pub fn with_validator(mut self, validator: TokenValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn stats(&self) -> BotStats {
        self.stats
    }

    /// Batches completed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Publish once to every target, in order.
    pub async fn run_batch(&mut self) -> BatchReport {
        let mut report = BatchReport::default();
        let targets = self.targets.clone();

        for (index, target) in targets.iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.skipped = targets.len() - index;
                debug!(skipped = report.skipped, "batch cancelled");
                break;
            }
            if index > 0 && !self.cancel.sleep(self.settings.inter_repo_delay).await {
                report.skipped = targets.len() - index;
                debug!(skipped = report.skipped, "batch cancelled");
                break;
            }

            report.attempted += 1;
            if self.publish_one(target).await {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }

        self.cycles += 1;
        report
    }

    /// Validate the token, then run batches until cancelled.
    pub async fn run(&mut self) -> Result<BotStats, SchedulerError> {
        if self.targets.is_empty() {
            return Err(SchedulerError::NoTargets);
        }

        if let Some(validator) = &self.validator {
            let validation = validator.validate(&self.token).await?;
            if !validation.valid {
                return Err(SchedulerError::InvalidToken(
                    validation.reason.unwrap_or_else(|| "invalid token".to_string()),
                ));
            }
            info!(login = validation.login.as_deref().unwrap_or("-"), "token validated");
        }

        info!(
            targets = self.targets.len(),
            interval_secs = self.settings.interval.as_secs(),
            kind = %self.settings.kind,
            "scheduler started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let report = self.run_batch().await;
            info!(
                cycle = self.cycles,
                succeeded = report.succeeded,
                failed = report.failed,
                "batch finished"
            );

            if let Some(max) = self.settings.max_cycles {
                if self.cycles >= max {
                    break;
                }
            }
            if !self.cancel.sleep(self.settings.interval).await {
                break;
            }
        }

        info!(
            total = self.stats.total,
            successful = self.stats.successful,
            failed = self.stats.failed,
            "scheduler stopped"
        );
        Ok(self.stats)
    }

    /// Publish generated content to one target and record the outcome.
    async fn publish_one(&mut self, target: &Target) -> bool {
        let now = Utc::now();
        let ctx = ContentContext {
            commit_number: self.stats.total + 1,
            repository: target.repository.name().to_string(),
            branch: target.branch.clone(),
            message: self.settings.message.clone(),
            timestamp: now,
            random_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            stats: self.stats,
            repositories: self.targets.len(),
            interval_secs: self.settings.interval.as_secs(),
            custom_path: self.settings.custom_path.clone(),
            custom_template: self.settings.custom_template.clone(),
        };
        let file = generate(self.settings.kind, &ctx);
        let message = format!("{} - {}", self.settings.message, now.to_rfc3339());

        let result = self
            .publisher
            .publish(
                &target.repository,
                &target.branch,
                &self.token,
                &message,
                std::slice::from_ref(&file),
            )
            .await;

        let repository = Some(target.repository.to_string());
        let entry = match &result {
            Ok(done) => CommitLog::success(done, self.settings.kind, repository),
            Err(err) => {
                warn!(repository = %target.repository, error = %err, "scheduled commit failed");
                CommitLog::error(err.to_string(), self.settings.kind, repository)
            }
        };
        self.stats.record(result.is_ok());
        self.sink.record(&entry);
        result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log::MemorySink;
    use crate::core::types::RepositoryRef;
    use crate::engine::retry::RecordingSleeper;
    use crate::forge::mock::{MockCall, MockGitData};
    use crate::forge::MockConnector;

    fn target(name: &str) -> Target {
        Target {
            repository: RepositoryRef::new("owner", name).unwrap(),
            branch: "main".into(),
        }
    }

    fn seeded(connector: &MockConnector, name: &str) {
        connector.insert(MockGitData::with_initial_commit(
            target(name).repository,
            "main",
            &[("README.md", "hi")],
        ));
    }

    fn scheduler(connector: &MockConnector, targets: Vec<Target>) -> (Scheduler, MemorySink) {
        let publisher = CommitPublisher::new(Arc::new(connector.clone()))
            .with_sleeper(Arc::new(RecordingSleeper::new()));
        let settings = ScheduleSettings {
            inter_repo_delay: Duration::ZERO,
            interval: Duration::from_secs(60),
            ..Default::default()
        };
        let sink = MemorySink::new();
        let scheduler = Scheduler::new(publisher, "token", targets, settings)
            .with_sink(Arc::new(sink.clone()));
        (scheduler, sink)
    }

    #[tokio::test]
    async fn cancel_flag_basics() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
        flag.cancelled().await;
        assert!(!flag.sleep(Duration::from_secs(3600)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_sleep() {
        let flag = CancelFlag::new();
        let waiter = flag.clone();
        let handle = tokio::spawn(async move { waiter.sleep(Duration::from_secs(3600)).await });
        tokio::task::yield_now().await;
        flag.cancel();
        assert!(!handle.await.unwrap());
    }

    #[tokio::test]
    async fn batch_publishes_in_order_and_tallies() {
        let connector = MockConnector::new();
        seeded(&connector, "a");
        seeded(&connector, "c");
        // "b" is not registered, so it is missing.
        let (mut scheduler, sink) =
            scheduler(&connector, vec![target("a"), target("b"), target("c")]);

        let report = scheduler.run_batch().await;

        assert_eq!(
            report,
            BatchReport {
                attempted: 3,
                succeeded: 2,
                failed: 1,
                skipped: 0
            }
        );
        assert_eq!(
            scheduler.stats(),
            BotStats {
                total: 3,
                successful: 2,
                failed: 1
            }
        );

        let entries = sink.entries();
        let repos: Vec<_> = entries
            .iter()
            .rev()
            .map(|e| e.repository.clone().unwrap())
            .collect();
        assert_eq!(repos, vec!["owner/a", "owner/b", "owner/c"]);
        assert!(!entries[1].is_success());
    }

    #[tokio::test]
    async fn batch_commits_generated_file() {
        let connector = MockConnector::new();
        seeded(&connector, "a");
        let (mut scheduler, _sink) = scheduler(&connector, vec![target("a")]);

        scheduler.run_batch().await;

        let api = connector.get(&target("a").repository).unwrap();
        let head = api.ref_sha("main").unwrap();
        let commit = api.commit(&head).unwrap();
        assert!(commit.message.starts_with("Auto-commit: Update files - "));
        let tree = crate::forge::GitData::get_tree(&api, &commit.tree_sha)
            .await
            .unwrap();
        assert!(tree.entry("auto-commits/commit-1.md").is_some());
        assert!(tree.entry("README.md").is_some());
    }

    #[tokio::test]
    async fn cancelled_batch_skips_everything() {
        let connector = MockConnector::new();
        seeded(&connector, "a");
        let (mut scheduler, sink) = scheduler(&connector, vec![target("a"), target("a")]);
        scheduler.cancel_flag().cancel();

        let report = scheduler.run_batch().await;

        assert_eq!(report.attempted, 0);
        assert_eq!(report.skipped, 2);
        assert!(sink.entries().is_empty());
        let api = connector.get(&target("a").repository).unwrap();
        assert_eq!(api.count(MockCall::CreateBlob), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_after_max_cycles() {
        let connector = MockConnector::new();
        seeded(&connector, "a");
        let (scheduler, sink) = scheduler(&connector, vec![target("a")]);
        let mut scheduler = Scheduler {
            settings: ScheduleSettings {
                max_cycles: Some(3),
                ..scheduler.settings.clone()
            },
            ..scheduler
        };

        let stats = scheduler.run().await.unwrap();

        assert_eq!(scheduler.cycles(), 3);
        assert_eq!(stats.successful, 3);
        assert_eq!(sink.entries().len(), 3);
    }

    #[tokio::test]
    async fn run_without_targets_fails() {
        let connector = MockConnector::new();
        let (mut scheduler, _sink) = scheduler(&connector, vec![]);
        assert!(matches!(
            scheduler.run().await,
            Err(SchedulerError::NoTargets)
        ));
    }
}
