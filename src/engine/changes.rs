//! engine::changes
//!
//! Detects whether a branch moved since a known commit.

use serde::{Deserialize, Serialize};

use crate::forge::{ForgeError, GitData};

/// Whether `latest` differs from the last commit the caller saw.
///
/// With no known commit every tip counts as a change.
pub fn has_changes(latest: &str, last_known: Option<&str>) -> bool {
    last_known != Some(latest)
}

/// Result of a change check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatus {
    pub has_changes: bool,
    pub latest_commit_sha: String,
    pub latest_commit_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_commit_date: Option<String>,
}

/// Fetch the tip of `branch` and compare it with `last_known`.
pub async fn check_changes(
    api: &dyn GitData,
    branch: &str,
    last_known: Option<&str>,
) -> Result<ChangeStatus, ForgeError> {
    let latest = api.latest_commit(branch).await?;
    tracing::debug!(branch, latest = %latest.sha, ?last_known, "checked branch tip");

    Ok(ChangeStatus {
        has_changes: has_changes(&latest.sha, last_known),
        latest_commit_sha: latest.sha,
        latest_commit_message: latest.message,
        latest_commit_date: latest.date,
    })
}
