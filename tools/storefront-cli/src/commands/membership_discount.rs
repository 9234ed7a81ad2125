//! Membership discount commands.

use anyhow::{anyhow, Result};
use storefront_commerce::cart::MembershipDiscount;
use storefront_commerce::membership::MembershipLevel;
use storefront_commerce::DiscountId;

use super::discount::{build_terms, validity};
use super::{MembershipDiscountArgs, MembershipDiscountCommand};
use crate::context::Context;
use crate::output::status_badge;

fn parse_level(s: &str) -> Result<MembershipLevel> {
    MembershipLevel::parse(s).ok_or_else(|| {
        anyhow!(
            "Unknown membership level: {} (expected regular, silver, gold or diamond)",
            s
        )
    })
}

/// Run the membership-discount command.
pub async fn run(args: MembershipDiscountArgs, ctx: &Context) -> Result<()> {
    let discounts = ctx.orders.discounts();
    match args.command {
        MembershipDiscountCommand::Add { level, name, value } => {
            let level = parse_level(&level)?;
            let terms = build_terms(ctx, &value)?;
            let discount = discounts
                .create_membership_discount(MembershipDiscount::new(level, name, terms))
                .await?;

            if ctx.output.is_json() {
                ctx.output.json(&discount);
                return Ok(());
            }
            ctx.output.success(&format!(
                "Created {} for {} members ({})",
                discount.name,
                discount.membership_level.as_str(),
                discount.id
            ));
            Ok(())
        }
        MembershipDiscountCommand::List { level } => {
            let level = level.as_deref().map(parse_level).transpose()?;
            let listings = discounts.list_membership_discounts(level).await?;

            if ctx.output.is_json() {
                ctx.output.json(&listings);
                return Ok(());
            }
            if listings.is_empty() {
                ctx.output.info("No membership discounts.");
                return Ok(());
            }

            ctx.output.header("Membership discounts");
            let widths = [30, 10, 24, 12, 10];
            ctx.output
                .table_row(&["ID", "LEVEL", "NAME", "VALUE", "STATUS"], &widths);
            for listing in &listings {
                let d = &listing.discount;
                let value = d.terms.value.display();
                let status = status_badge(validity(&d.terms, listing.valid_now));
                ctx.output.table_row(
                    &[
                        d.id.as_str(),
                        d.membership_level.as_str(),
                        &d.name,
                        &value,
                        &status,
                    ],
                    &widths,
                );
            }
            Ok(())
        }
        MembershipDiscountCommand::Deactivate { id } => {
            let discount = discounts
                .deactivate_membership_discount(&DiscountId::new(id))
                .await?;
            if ctx.output.is_json() {
                ctx.output.json(&discount);
                return Ok(());
            }
            ctx.output.success(&format!("Deactivated {}", discount.name));
            Ok(())
        }
    }
}
