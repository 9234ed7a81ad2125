//! Discount code commands.

use anyhow::Result;
use storefront_commerce::cart::{Discount, DiscountTerms};
use storefront_commerce::current_timestamp;

use super::{DiscountArgs, DiscountCommand, DiscountValueArgs};
use crate::context::Context;
use crate::output::{format_timestamp, parse_timestamp, status_badge};

/// Run the discount command.
pub async fn run(args: DiscountArgs, ctx: &Context) -> Result<()> {
    let discounts = ctx.orders.discounts();
    match args.command {
        DiscountCommand::Add {
            code,
            name,
            value,
            usage_limit,
        } => {
            let mut terms = build_terms(ctx, &value)?;
            if let Some(limit) = usage_limit {
                terms = terms.with_usage_limit(limit);
            }
            let discount = discounts
                .create_discount(Discount::new(code, name, terms))
                .await?;

            if ctx.output.is_json() {
                ctx.output.json(&discount);
                return Ok(());
            }
            ctx.output.success(&format!(
                "Created {} ({} off)",
                discount.code,
                discount.terms.value.display()
            ));
            Ok(())
        }
        DiscountCommand::List => list(ctx).await,
        DiscountCommand::Deactivate { code } => {
            let discount = discounts.deactivate_discount(&code).await?;
            if ctx.output.is_json() {
                ctx.output.json(&discount);
                return Ok(());
            }
            ctx.output.success(&format!("Deactivated {}", discount.code));
            Ok(())
        }
        DiscountCommand::Delete { code } => {
            discounts.delete_discount(&code).await?;
            if ctx.output.is_json() {
                ctx.output.json(&serde_json::json!({ "deleted": code }));
                return Ok(());
            }
            ctx.output.success(&format!("Deleted {}", code));
            Ok(())
        }
    }
}

/// Terms shared by code and membership discounts.
pub(crate) fn build_terms(ctx: &Context, args: &DiscountValueArgs) -> Result<DiscountTerms> {
    let pricing = &ctx.config.pricing;
    let value = args.value(|amount| pricing.money(amount))?;
    let starts_at = match &args.starts {
        Some(s) => parse_timestamp(s)?,
        None => current_timestamp(),
    };

    let mut terms =
        DiscountTerms::new(value, starts_at).with_minimum_order(pricing.money(args.min_order));
    if let Some(max) = args.max_discount {
        terms = terms.with_maximum_discount(pricing.money(max));
    }
    if let Some(ends) = &args.ends {
        terms = terms.ending_at(parse_timestamp(ends)?);
    }
    Ok(terms)
}

/// Usage as `used/limit`, or just `used` when unlimited.
fn usage(terms: &DiscountTerms) -> String {
    match terms.usage_limit {
        Some(limit) => format!("{}/{}", terms.usage_count, limit),
        None => terms.usage_count.to_string(),
    }
}

pub(crate) fn validity(terms: &DiscountTerms, valid_now: bool) -> &'static str {
    if valid_now {
        "valid"
    } else if !terms.active {
        "inactive"
    } else {
        "unavailable"
    }
}

async fn list(ctx: &Context) -> Result<()> {
    let listings = ctx.orders.discounts().list_discounts().await?;

    if ctx.output.is_json() {
        ctx.output.json(&listings);
        return Ok(());
    }

    if listings.is_empty() {
        ctx.output.info("No discount codes.");
        return Ok(());
    }

    ctx.output.header("Discount codes");
    let widths = [14, 24, 12, 10, 20, 10];
    ctx.output.table_row(
        &["CODE", "NAME", "VALUE", "USED", "ENDS", "STATUS"],
        &widths,
    );
    for listing in &listings {
        let d = &listing.discount;
        let value = d.terms.value.display();
        let used = usage(&d.terms);
        let ends = d
            .terms
            .ends_at
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string());
        let status = status_badge(validity(&d.terms, listing.valid_now));
        ctx.output
            .table_row(&[&d.code, &d.name, &value, &used, &ends, &status], &widths);
    }

    Ok(())
}
