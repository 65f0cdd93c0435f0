//! core::content
//!
//! Generated file content for scheduled commits.
//!
//! Each [`ContentKind`] produces exactly one [`FileChange`]. Generation is
//! pure: the same [`ContentContext`] always yields the same file, so the
//! scheduler decides timestamps and counters and this module only renders.
//!
//! | Kind      | Path                            |
//! |-----------|---------------------------------|
//! | `simple`  | `auto-commits/commit-<n>.md`    |
//! | `readme`  | `README.md`                     |
//! | `version` | `package.json`                  |
//! | `code`    | `src/auto_generated.rs`         |
//! | `custom`  | configured path and template    |
//!
//! Custom templates may use the placeholders `{timestamp}`, `{date}`,
//! `{time}`, `{commitNumber}`, `{randomId}`, `{repository}`,
//! `{totalCommits}` and `{successRate}`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::log::BotStats;
use super::types::FileChange;

/// Default path of `custom` content.
pub const DEFAULT_CUSTOM_PATH: &str = "auto-commits/activity.md";

/// What a scheduled commit changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Simple,
    Readme,
    Version,
    Code,
    Custom,
}

impl ContentKind {
    pub const ALL: [ContentKind; 5] = [
        ContentKind::Simple,
        ContentKind::Readme,
        ContentKind::Version,
        ContentKind::Code,
        ContentKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Simple => "simple",
            ContentKind::Readme => "readme",
            ContentKind::Version => "version",
            ContentKind::Code => "code",
            ContentKind::Custom => "custom",
        }
    }

    /// Human-readable title, used in log messages.
    pub fn title(&self) -> &'static str {
        match self {
            ContentKind::Simple => "Simple Commits",
            ContentKind::Readme => "README Updates",
            ContentKind::Version => "Version Bumps",
            ContentKind::Code => "Code Changes",
            ContentKind::Custom => "Custom Files",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown commit type '{}' (expected simple, readme, version, code or custom)",
                    s
                )
            })
    }
}

/// Everything a generator may render.
#[derive(Debug, Clone)]
pub struct ContentContext {
    /// 1-based number of the commit being generated
    pub commit_number: u64,
    /// Repository name shown in the content
    pub repository: String,
    pub branch: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Short id distinguishing otherwise identical content
    pub random_id: String,
    /// Statistics before this commit
    pub stats: BotStats,
    /// Number of repositories the scheduler manages
    pub repositories: usize,
    /// Seconds between batches
    pub interval_secs: u64,
    pub custom_path: String,
    /// Template for `custom`; a default log entry is rendered when absent
    pub custom_template: Option<String>,
}

impl ContentContext {
    pub fn new(repository: impl Into<String>, commit_number: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            commit_number,
            repository: repository.into(),
            branch: "main".to_string(),
            message: String::new(),
            timestamp,
            random_id: String::new(),
            stats: BotStats::default(),
            repositories: 1,
            interval_secs: 300,
            custom_path: DEFAULT_CUSTOM_PATH.to_string(),
            custom_template: None,
        }
    }

    fn iso(&self) -> String {
        self.timestamp.to_rfc3339()
    }

    fn date(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }

    fn time(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }

    /// Total commits counting the one being generated.
    fn total_commits(&self) -> u64 {
        self.stats.total + 1
    }
}

/// Semantic version for the `n`-th commit: `2.<n/10>.<n%10>`.
pub fn version_for(commit_number: u64) -> String {
    format!("2.{}.{}", commit_number / 10, commit_number % 10)
}

/// Render the file change for `kind`.
pub fn generate(kind: ContentKind, ctx: &ContentContext) -> FileChange {
    match kind {
        ContentKind::Simple => simple(ctx),
        ContentKind::Readme => readme(ctx),
        ContentKind::Version => version(ctx),
        ContentKind::Code => code(ctx),
        ContentKind::Custom => custom(ctx),
    }
}

/// Substitute the template placeholders.
pub fn render_template(template: &str, ctx: &ContentContext) -> String {
    template
        .replace("{timestamp}", &ctx.iso())
        .replace("{date}", &ctx.date())
        .replace("{time}", &ctx.time())
        .replace("{commitNumber}", &ctx.commit_number.to_string())
        .replace("{randomId}", &ctx.random_id)
        .replace("{repository}", &ctx.repository)
        .replace("{totalCommits}", &ctx.total_commits().to_string())
        .replace("{successRate}", &ctx.stats.success_rate().to_string())
}

fn simple(ctx: &ContentContext) -> FileChange {
    let content = format!(
        "# Auto-commit Log Entry #{n}\n\
         \n\
         - Timestamp: {ts}\n\
         - Commit ID: {id}\n\
         - Message: {msg}\n\
         - Branch: {branch}\n\
         - Repository: {repo}\n\
         - Interval: {interval} seconds\n\
         - Total Commits: {total}\n\
         - Repositories Managed: {repos}\n\
         \n\
         Generated at: {date} {time}\n",
        n = ctx.commit_number,
        ts = ctx.iso(),
        id = ctx.random_id,
        msg = ctx.message,
        branch = ctx.branch,
        repo = ctx.repository,
        interval = ctx.interval_secs,
        total = ctx.total_commits(),
        repos = ctx.repositories,
        date = ctx.date(),
        time = ctx.time(),
    );
    FileChange::new(format!("auto-commits/commit-{}.md", ctx.commit_number), content)
}

fn readme(ctx: &ContentContext) -> FileChange {
    let content = format!(
        "# {repo}\n\
         \n\
         ![Last Updated](https://img.shields.io/badge/last%20updated-{badge_date}-red)\n\
         ![Commits](https://img.shields.io/badge/commits-{total}-red)\n\
         ![Repositories](https://img.shields.io/badge/repositories-{repos}-red)\n\
         \n\
         ## Project Stats\n\
         \n\
         - **Total Commits**: {total}\n\
         - **Success Rate**: {rate}%\n\
         - **Repositories Managed**: {repos}\n\
         - **Last Updated**: {date} at {time}\n\
         - **Auto-Commit ID**: `{id}`\n\
         \n\
         ## Recent Activity\n\
         \n\
         - Automated commit #{n}\n\
         - Repository synchronized: {repo}\n\
         \n\
         ---\n\
         *This README is automatically updated by autocommitter*\n\
         *Generated on: {ts}*\n",
        repo = ctx.repository,
        badge_date = ctx.date().replace('-', "--"),
        total = ctx.total_commits(),
        repos = ctx.repositories,
        rate = ctx.stats.success_rate(),
        date = ctx.date(),
        time = ctx.time(),
        id = ctx.random_id,
        n = ctx.commit_number,
        ts = ctx.iso(),
    );
    FileChange::new("README.md", content)
}

fn version(ctx: &ContentContext) -> FileChange {
    let manifest = serde_json::json!({
        "name": ctx.repository.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-"),
        "version": version_for(ctx.commit_number),
        "description": "Auto-updated project with version management",
        "lastUpdated": ctx.iso(),
        "buildNumber": ctx.commit_number,
        "releaseDate": ctx.date(),
        "autoCommitter": {
            "enabled": true,
            "lastCommit": ctx.iso(),
            "commitId": ctx.random_id,
        },
        "analytics": {
            "totalCommits": ctx.total_commits(),
            "successRate": ctx.stats.success_rate(),
            "repositoriesManaged": ctx.repositories,
        },
    });
    // A json! value with string keys always serializes.
    let content = serde_json::to_string_pretty(&manifest).unwrap_or_default();
    FileChange::new("package.json", content + "\n")
}

fn code(ctx: &ContentContext) -> FileChange {
    let content = format!(
        "// Auto-generated build information.\n\
         // Last updated: {ts}\n\
         // Repository: {repo}\n\
         \n\
         pub const BUILD_TIMESTAMP: &str = \"{ts}\";\n\
         pub const BUILD_NUMBER: u64 = {n};\n\
         pub const VERSION: &str = \"{version}\";\n\
         pub const COMMIT_ID: &str = \"{id}\";\n\
         pub const REPOSITORY: &str = {repo:?};\n\
         pub const TOTAL_COMMITS: u64 = {total};\n\
         pub const SUCCESS_RATE: u32 = {rate};\n\
         pub const INTERVAL_SECS: u64 = {interval};\n\
         pub const MULTI_REPOSITORY: bool = {multi};\n",
        ts = ctx.iso(),
        repo = ctx.repository,
        n = ctx.commit_number,
        version = version_for(ctx.commit_number),
        id = ctx.random_id,
        total = ctx.total_commits(),
        rate = ctx.stats.success_rate(),
        interval = ctx.interval_secs,
        multi = ctx.repositories > 1,
    );
    FileChange::new("src/auto_generated.rs", content)
}

fn custom(ctx: &ContentContext) -> FileChange {
    let content = match ctx.custom_template.as_deref().filter(|t| !t.is_empty()) {
        Some(template) => render_template(template, ctx),
        None => format!(
            "# Custom Activity Log - {repo}\n\
             \n\
             ## Commit #{n}\n\
             \n\
             - **Timestamp**: {ts}\n\
             - **ID**: {id}\n\
             - **Total Commits**: {total}\n\
             - **Success Rate**: {rate}%\n",
            repo = ctx.repository,
            n = ctx.commit_number,
            ts = ctx.iso(),
            id = ctx.random_id,
            total = ctx.total_commits(),
            rate = ctx.stats.success_rate(),
        ),
    };
    FileChange::new(ctx.custom_path.clone(), content)
}
