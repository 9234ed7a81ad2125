//! Auto-confirmation settings commands.

use anyhow::Result;
use storefront_commerce::checkout::OrderConfirmationSettings;

use super::{SettingsArgs, SettingsCommand};
use crate::context::Context;
use crate::output::format_timestamp;

/// Run the settings command.
pub async fn run(args: SettingsArgs, ctx: &Context) -> Result<()> {
    match args.command {
        SettingsCommand::Show => {
            let settings = ctx.settings.load().await?;
            show(ctx, &settings);
            Ok(())
        }
        SettingsCommand::Set {
            enabled,
            delay_minutes,
            exclude_cod,
            exclude_high_value,
            high_value_threshold,
        } => {
            let mut settings = ctx.settings.load().await?;
            if let Some(enabled) = enabled {
                settings.auto_confirm_enabled = enabled;
            }
            if let Some(minutes) = delay_minutes {
                settings.confirmation_delay_minutes = minutes;
            }
            if let Some(exclude) = exclude_cod {
                settings.exclude_cash_on_delivery = exclude;
            }
            if let Some(exclude) = exclude_high_value {
                settings.exclude_high_value = exclude;
            }
            if let Some(threshold) = high_value_threshold {
                settings.high_value_threshold = ctx.config.pricing.money(threshold);
            }

            let settings = ctx.settings.update(settings).await?;
            if !ctx.output.is_json() {
                ctx.output.success("Settings saved");
            }
            show(ctx, &settings);
            Ok(())
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn show(ctx: &Context, settings: &OrderConfirmationSettings) {
    if ctx.output.is_json() {
        ctx.output.json(settings);
        return;
    }

    ctx.output.header("Auto-confirmation");
    ctx.output.kv("Enabled", on_off(settings.auto_confirm_enabled));
    ctx.output.kv(
        "Delay",
        &format!("{} minute(s)", settings.confirmation_delay_minutes),
    );
    ctx.output
        .kv("Exclude cash on delivery", on_off(settings.exclude_cash_on_delivery));
    ctx.output
        .kv("Exclude high value", on_off(settings.exclude_high_value));
    if settings.exclude_high_value {
        ctx.output
            .kv("High value threshold", &settings.high_value_threshold.display());
    }
    if settings.updated_at > 0 {
        ctx.output.kv("Updated", &format_timestamp(settings.updated_at));
    }
}
