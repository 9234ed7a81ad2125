//! Auto-confirmation sweep commands.

use anyhow::{Context as _, Result};
use storefront_orders::{AutoConfirmSweep, BackgroundTasks, SweepReport, TaskKind};
use tokio_util::sync::CancellationToken;

use super::{SweepArgs, SweepCommand};
use crate::context::Context;
use crate::output::format_duration;

/// Run the sweep command.
pub async fn run(args: SweepArgs, ctx: &Context) -> Result<()> {
    match args.command {
        SweepCommand::Once => once(ctx).await,
        SweepCommand::Run => daemon(ctx).await,
    }
}

fn new_sweep(ctx: &Context, shutdown: CancellationToken) -> AutoConfirmSweep {
    AutoConfirmSweep::new(
        ctx.orders.clone(),
        ctx.settings.clone(),
        ctx.config.sweep.min_poll(),
        shutdown,
    )
}

async fn once(ctx: &Context) -> Result<()> {
    let report = new_sweep(ctx, CancellationToken::new()).sweep().await?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }
    print_report(ctx, &report);
    Ok(())
}

fn print_report(ctx: &Context, report: &SweepReport) {
    if !report.enabled {
        ctx.output.info("Auto-confirmation is disabled; nothing to do.");
        ctx.output
            .info("Run `storefront settings set --enabled true` to switch it on.");
        return;
    }

    ctx.output.success(&format!(
        "Confirmed {} of {} eligible order(s)",
        report.confirmed, report.selected
    ));
    ctx.output
        .kv("Delay", &format!("{} minute(s)", report.delay_minutes));
    if report.failed > 0 {
        ctx.output
            .warn(&format!("{} order(s) could not be confirmed", report.failed));
    }
    if report.skipped_cod > 0 {
        ctx.output
            .kv("Left for review (cash on delivery)", &report.skipped_cod.to_string());
    }
    if report.skipped_high_value > 0 {
        ctx.output
            .kv("Left for review (high value)", &report.skipped_high_value.to_string());
    }
}

async fn daemon(ctx: &Context) -> Result<()> {
    let mut tasks = BackgroundTasks::new();
    let sweep = new_sweep(ctx, tasks.shutdown_token());
    tasks.spawn("auto_confirm_sweep", TaskKind::Periodic, sweep.run());

    ctx.output.success(&format!(
        "Sweeping pending orders (minimum interval {}). Press Ctrl-C to stop.",
        format_duration(ctx.config.sweep.min_poll().as_secs())
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    ctx.output.info("Shutting down...");
    tasks.shutdown().await;
    ctx.output.success("Stopped");
    Ok(())
}
