//! cli::commands::run_cmd
//!
//! Publish on a timer until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use super::{connector, content_kind, require_token};
use crate::auth::TokenValidator;
use crate::cli::Context;
use crate::core::log::{BotStats, FanoutSink, JsonLinesSink, TracingSink};
use crate::engine::{CancelFlag, CommitPublisher, ScheduleSettings, Scheduler};
use crate::ui::output;

#[derive(Serialize)]
struct RunSummary {
    cycles: u64,
    stats: BotStats,
    success_rate: u32,
}

/// Run the run command.
pub async fn run(
    ctx: &Context,
    once: bool,
    cycles: Option<u64>,
    interval: Option<u64>,
    kind: Option<String>,
) -> Result<()> {
    let token = require_token(ctx)?;
    let targets = ctx.config.targets()?;

    if !ctx.json {
        let names: Vec<String> = targets
            .iter()
            .map(|t| format!("{} ({})", t.repository, t.branch))
            .collect();
        output::print("Publishing to:", ctx.verbosity);
        output::print(output::format_list(&names, "  - "), ctx.verbosity);
    }

    let mut settings = ScheduleSettings::from_config(&ctx.config);
    settings.kind = content_kind(ctx, kind.as_deref())?;
    settings.max_cycles = if once { Some(1) } else { cycles };
    if let Some(secs) = interval {
        settings.interval = Duration::from_secs(secs.max(1));
    }

    let mut sink = FanoutSink::new().with(Arc::new(TracingSink));
    if let Some(path) = ctx.config.log_file() {
        sink = sink.with(Arc::new(JsonLinesSink::new(path)));
    }

    let publisher = CommitPublisher::new(Arc::new(connector(ctx)))
        .with_policy(ctx.config.retry_policy());
    let validator = TokenValidator::with_options(ctx.config.api_base(), ctx.config.timeout())?;
    let cancel = CancelFlag::new();

    let mut scheduler = Scheduler::new(publisher, token, targets, settings)
        .with_sink(Arc::new(sink))
        .with_validator(validator)
        .with_cancel(cancel.clone());

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, finishing current commit");
            cancel.cancel();
        }
    });

    let result = scheduler.run().await;
    interrupt.abort();
    let stats = result?;

    let summary = RunSummary {
        cycles: scheduler.cycles(),
        stats,
        success_rate: stats.success_rate(),
    };
    if ctx.json {
        return output::json(&summary);
    }
    output::print(
        output::format_fields(&[
            ("batches", summary.cycles.to_string()),
            ("commits", stats.total.to_string()),
            ("successful", stats.successful.to_string()),
            ("failed", stats.failed.to_string()),
            ("success rate", format!("{}%", summary.success_rate)),
        ]),
        ctx.verbosity,
    );
    Ok(())
}
