//! Scheduler runs driven by a parsed configuration.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use autocommitter::auth::TokenValidator;
use autocommitter::core::config::Config;
use autocommitter::core::content::ContentKind;
use autocommitter::core::log::{CommitLog, FanoutSink, JsonLinesSink, LogStatus, MemorySink};
use autocommitter::core::types::RepositoryRef;
use autocommitter::engine::retry::RecordingSleeper;
use autocommitter::engine::scheduler::SchedulerError;
use autocommitter::engine::{CommitPublisher, ScheduleSettings, Scheduler};
use autocommitter::forge::mock::MockGitData;
use autocommitter::forge::{GitData, MockConnector};

const CONFIG: &str = r#"
branch = "main"
message = "Scheduled update"
commit_type = "version"
inter_repo_delay_ms = 0

[[repositories]]
url = "https://github.com/octocat/alpha"

[[repositories]]
url = "https://github.com/octocat/beta"
active = false

[[repositories]]
url = "https://github.com/octocat/gamma"
branch = "activity"
"#;

fn seeded(connector: &MockConnector, name: &str) -> MockGitData {
    let repo = RepositoryRef::new("octocat", name).unwrap();
    let api = MockGitData::with_initial_commit(repo, "main", &[("README.md", "# repo")]);
    connector.insert(api.clone());
    api
}

fn publisher(connector: &MockConnector) -> CommitPublisher {
    CommitPublisher::new(Arc::new(connector.clone()))
        .with_sleeper(Arc::new(RecordingSleeper::new()))
}

#[tokio::test]
async fn configured_targets_are_published_and_logged() {
    let config = Config::parse(CONFIG).unwrap();
    let targets = config.targets().unwrap();
    assert_eq!(targets.len(), 2);

    let connector = MockConnector::new();
    let alpha = seeded(&connector, "alpha");
    let gamma = seeded(&connector, "gamma");

    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("logs/commits.jsonl");
    let memory = Arc::new(MemorySink::new());
    let sink = FanoutSink::new()
        .with(memory.clone())
        .with(Arc::new(JsonLinesSink::new(&log_path)));

    let mut settings = ScheduleSettings::from_config(&config);
    settings.max_cycles = Some(1);
    assert_eq!(settings.kind, ContentKind::Version);

    let mut scheduler = Scheduler::new(publisher(&connector), "ghp_test", targets, settings)
        .with_sink(Arc::new(sink));
    let stats = scheduler.run().await.unwrap();

    assert_eq!(stats.total, 2);
    assert_eq!(stats.successful, 2);
    assert_eq!(scheduler.cycles(), 1);

    // gamma's branch did not exist and was created from main.
    assert!(gamma.ref_sha("activity").is_some());
    let tip = alpha.ref_sha("main").unwrap();
    let commit = alpha.commit(&tip).unwrap();
    assert!(commit.message.starts_with("Scheduled update - "));
    let tree = alpha.get_tree(&commit.tree_sha).await.unwrap();
    let manifest = alpha
        .get_blob(&tree.entry("package.json").unwrap().sha)
        .await
        .unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    assert_eq!(manifest["version"], "2.0.1");

    let written = std::fs::read_to_string(&log_path).unwrap();
    let entries: Vec<CommitLog> = written
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.status == LogStatus::Success));
    assert_eq!(entries[0].repository.as_deref(), Some("octocat/alpha"));
    assert_eq!(entries[1].repository.as_deref(), Some("octocat/gamma"));
    assert_eq!(memory.entries().len(), 2);
}

#[tokio::test]
async fn failing_target_does_not_stop_the_batch() {
    let config = Config::parse(CONFIG).unwrap();
    let connector = MockConnector::new();
    // alpha is never registered and answers 404.
    let gamma = seeded(&connector, "gamma");

    let memory = Arc::new(MemorySink::new());
    let mut settings = ScheduleSettings::from_config(&config);
    settings.max_cycles = Some(1);
    let mut scheduler = Scheduler::new(
        publisher(&connector),
        "ghp_test",
        config.targets().unwrap(),
        settings,
    )
    .with_sink(memory.clone());

    let stats = scheduler.run().await.unwrap();

    assert_eq!((stats.successful, stats.failed), (1, 1));
    assert_eq!(stats.success_rate(), 50);
    assert!(gamma.ref_sha("activity").is_some());
    let newest_first = memory.entries();
    assert_eq!(newest_first[1].status, LogStatus::Error);
    assert!(newest_first[1].message.contains("not found"));
}

#[tokio::test]
async fn rejected_token_stops_before_publishing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config::parse(CONFIG).unwrap();
    let connector = MockConnector::new();
    let alpha = seeded(&connector, "alpha");
    let before = alpha.ref_sha("main");
    let validator = TokenValidator::with_options(server.uri(), Duration::from_secs(5)).unwrap();

    let mut scheduler = Scheduler::new(
        publisher(&connector),
        "ghp_revoked",
        config.targets().unwrap(),
        ScheduleSettings::from_config(&config),
    )
    .with_validator(validator);

    let err = scheduler.run().await.unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidToken(ref reason) if reason == "Invalid or expired token"));
    assert_eq!(alpha.ref_sha("main"), before);
    assert_eq!(scheduler.stats().total, 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_ends_the_interval_wait() {
    let config = Config::parse(CONFIG).unwrap();
    let connector = MockConnector::new();
    seeded(&connector, "alpha");
    seeded(&connector, "gamma");

    let mut settings = ScheduleSettings::from_config(&config);
    settings.interval = Duration::from_secs(3600);
    let mut scheduler = Scheduler::new(
        publisher(&connector),
        "ghp_test",
        config.targets().unwrap(),
        settings,
    );
    let cancel = scheduler.cancel_flag();

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        cancel.cancel();
    });

    let stats = scheduler.run().await.unwrap();
    stopper.await.unwrap();

    assert_eq!(scheduler.cycles(), 1);
    assert_eq!(stats.total, 2);
}
