//! cli::commands::publish
//!
//! Publish one commit.
//!
//! # Files
//!
//! In order of preference:
//! 1. `--file REMOTE=LOCAL`, reading each local file
//! 2. `[[files]]` from the config file
//! 3. One generated file for `--type` (or the configured commit type)

use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _, Result};
use chrono::Utc;
use uuid::Uuid;

use super::{connector, content_kind, require_repository, require_token};
use crate::cli::Context;
use crate::core::content::{generate, ContentContext};
use crate::core::types::{FileChange, RepositoryRef};
use crate::engine::{CommitPublisher, PublishOutcome};
use crate::ui::output;

/// Run the publish command.
pub async fn publish(
    ctx: &Context,
    repo: Option<String>,
    branch: Option<String>,
    message: Option<String>,
    file_args: Vec<String>,
    kind: Option<String>,
) -> Result<()> {
    let token = require_token(ctx)?;
    let repository = require_repository(ctx, repo.as_deref())?;
    let branch = branch.unwrap_or_else(|| ctx.config.branch().to_string());
    let message = message.unwrap_or_else(|| ctx.config.message().to_string());
    let files = collect_files(ctx, &file_args, kind.as_deref(), &repository, &branch, &message)?;

    let publisher = CommitPublisher::new(Arc::new(connector(ctx)))
        .with_policy(ctx.config.retry_policy());
    let result = publisher
        .publish(&repository, &branch, &token, &message, &files)
        .await;

    if ctx.json {
        output::json(&PublishOutcome::from(&result))?;
    }
    let done = result.with_context(|| format!("failed to publish to {}", repository))?;

    if !ctx.json {
        output::print(done.message(), ctx.verbosity);
        output::print(
            output::format_fields(&[
                ("repository", repository.to_string()),
                ("branch", branch),
                ("commit", done.sha.clone()),
                ("url", done.url.clone()),
            ]),
            ctx.verbosity,
        );
    }
    Ok(())
}

fn collect_files(
    ctx: &Context,
    file_args: &[String],
    kind: Option<&str>,
    repository: &RepositoryRef,
    branch: &str,
    message: &str,
) -> Result<Vec<FileChange>> {
    if !file_args.is_empty() {
        return file_args
            .iter()
            .map(|arg| {
                let (remote, local) = parse_file_arg(arg)?;
                let content = fs::read_to_string(local)
                    .with_context(|| format!("failed to read '{}'", local))?;
                Ok(FileChange::new(remote, content))
            })
            .collect();
    }

    if !ctx.config.files().is_empty() && kind.is_none() {
        return Ok(ctx.config.files().to_vec());
    }

    let kind = content_kind(ctx, kind)?;
    let mut content = ContentContext::new(repository.name(), 1, Utc::now());
    content.branch = branch.to_string();
    content.message = message.to_string();
    content.random_id = Uuid::new_v4().simple().to_string()[..8].to_string();
    content.interval_secs = ctx.config.interval().as_secs();
    content.custom_path = ctx.config.custom_path().to_string();
    content.custom_template = ctx.config.custom_template().map(str::to_string);
    Ok(vec![generate(kind, &content)])
}

/// Split a `REMOTE=LOCAL` argument.
pub fn parse_file_arg(arg: &str) -> Result<(&str, &str)> {
    let (remote, local) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid --file '{}': expected REMOTE_PATH=LOCAL_FILE", arg))?;
    let remote = remote.trim().trim_start_matches('/');
    let local = local.trim();
    if remote.is_empty() || local.is_empty() {
        bail!("invalid --file '{}': both paths are required", arg);
    }
    Ok((remote, local))
}
