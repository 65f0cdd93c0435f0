//! cli::commands::check
//!
//! Report whether a branch moved since a known commit.

use anyhow::{Context as _, Result};

use super::{connector, require_repository, require_token};
use crate::cli::Context;
use crate::engine::changes::check_changes;
use crate::forge::Connector;
use crate::ui::output;

/// Run the check command.
pub async fn check(
    ctx: &Context,
    repo: Option<String>,
    branch: Option<String>,
    since: Option<String>,
) -> Result<()> {
    let token = require_token(ctx)?;
    let repository = require_repository(ctx, repo.as_deref())?;
    let branch = branch.unwrap_or_else(|| ctx.config.branch().to_string());

    let api = connector(ctx).connect(&repository, &token)?;
    let status = check_changes(api.as_ref(), &branch, since.as_deref())
        .await
        .with_context(|| format!("failed to read {} on {}", branch, repository))?;

    if ctx.json {
        return output::json(&status);
    }

    let verdict = if status.has_changes {
        "changed"
    } else {
        "unchanged"
    };
    output::print(
        output::format_fields(&[
            ("branch", format!("{} ({})", branch, verdict)),
            ("latest", status.latest_commit_sha.clone()),
            (
                "message",
                status
                    .latest_commit_message
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .to_string(),
            ),
            (
                "date",
                status.latest_commit_date.clone().unwrap_or_default(),
            ),
        ]),
        ctx.verbosity,
    );
    Ok(())
}
