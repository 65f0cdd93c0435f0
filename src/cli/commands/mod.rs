//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Resolves its inputs from flags, then the config file
//! 2. Calls the engine
//! 3. Formats and displays output
//!
//! Handlers are async; `cli::run` drives them on a tokio runtime.

mod check;
mod publish;
mod run_cmd;
mod validate_token;

pub use check::check;
pub use publish::{parse_file_arg, publish};
pub use run_cmd::run;
pub use validate_token::validate_token;

use anyhow::{anyhow, Context as _, Result};

use super::args::Command;
use super::Context;
use crate::core::config::TOKEN_ENV;
use crate::core::content::ContentKind;
use crate::core::types::RepositoryRef;
use crate::forge::GitHubConnector;

/// Dispatch a command to its handler.
pub async fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Publish {
            repo,
            branch,
            message,
            files,
            kind,
        } => publish(ctx, repo, branch, message, files, kind).await,
        Command::ValidateToken => validate_token(ctx).await,
        Command::Check { repo, branch, since } => check(ctx, repo, branch, since).await,
        Command::Run {
            once,
            cycles,
            interval,
            kind,
        } => run(ctx, once, cycles, interval, kind).await,
    }
}

/// The token from config or environment.
pub(crate) fn require_token(ctx: &Context) -> Result<String> {
    ctx.config.token().ok_or_else(|| {
        anyhow!(
            "no GitHub token configured\n\n\
             Set `token` in the config file or export {}.",
            TOKEN_ENV
        )
    })
}

/// The repository from `--repo`, else `repo_url` from config.
pub(crate) fn require_repository(ctx: &Context, flag: Option<&str>) -> Result<RepositoryRef> {
    match flag {
        Some(url) => RepositoryRef::parse(url).map_err(Into::into),
        None => ctx
            .config
            .repository()
            .context("no repository given; pass --repo or set repo_url in the config file"),
    }
}

/// Content kind from `--type`, else from config.
pub(crate) fn content_kind(ctx: &Context, flag: Option<&str>) -> Result<ContentKind> {
    match flag {
        Some(value) => value.parse().map_err(|e: String| anyhow!(e)),
        None => Ok(ctx.config.commit_type()),
    }
}

pub(crate) fn connector(ctx: &Context) -> GitHubConnector {
    GitHubConnector::new(ctx.config.api_base(), ctx.config.timeout())
}
