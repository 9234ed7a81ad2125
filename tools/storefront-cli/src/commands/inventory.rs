//! Stock commands.

use anyhow::Result;
use storefront_commerce::catalog::Inventory;
use storefront_commerce::ProductId;

use super::{InventoryArgs, InventoryCommand};
use crate::context::Context;
use crate::output::{format_timestamp, status_badge};

/// Run the inventory command.
pub async fn run(args: InventoryArgs, ctx: &Context) -> Result<()> {
    let ledger = ctx.orders.inventory();
    match args.command {
        InventoryCommand::Restock { product, quantity } => {
            let inventory = ledger.restock(&ProductId::new(product), quantity).await?;
            report(ctx, "Restocked", &inventory);
            Ok(())
        }
        InventoryCommand::Deduct { product, quantity } => {
            let inventory = ledger.deduct(&ProductId::new(product), quantity).await?;
            report(ctx, "Deducted", &inventory);
            Ok(())
        }
        InventoryCommand::Set { product, quantity } => {
            let inventory = ledger
                .set_quantity(&ProductId::new(product), quantity)
                .await?;
            report(ctx, "Corrected", &inventory);
            Ok(())
        }
        InventoryCommand::Levels { product, min, max } => {
            let inventory = ledger.set_levels(&ProductId::new(product), min, max).await?;
            report(ctx, "Levels updated", &inventory);
            Ok(())
        }
        InventoryCommand::Sync => {
            let touched = ledger.synchronize().await?;
            if ctx.output.is_json() {
                ctx.output.json(&serde_json::json!({ "synchronized": touched }));
                return Ok(());
            }
            ctx.output
                .success(&format!("Synchronized {} inventory record(s)", touched));
            Ok(())
        }
        InventoryCommand::LowStock => low_stock(ctx).await,
        InventoryCommand::Show { product, history } => {
            show(ctx, &ProductId::new(product), history).await
        }
    }
}

fn stock_state(inventory: &Inventory) -> &'static str {
    if inventory.is_out_of_stock() {
        "out"
    } else if inventory.is_low_stock() {
        "low"
    } else if inventory.is_overstocked() {
        "over"
    } else {
        "ok"
    }
}

fn report(ctx: &Context, action: &str, inventory: &Inventory) {
    if ctx.output.is_json() {
        ctx.output.json(inventory);
        return;
    }
    ctx.output.success(&format!(
        "{}: {} now has {} on hand",
        action, inventory.product_id, inventory.quantity
    ));
    if inventory.is_low_stock() {
        ctx.output.warn(&format!(
            "Below minimum level of {}",
            inventory.minimum_stock_level
        ));
    }
}

async fn low_stock(ctx: &Context) -> Result<()> {
    let rows = ctx.orders.inventory().low_stock().await?;

    if ctx.output.is_json() {
        ctx.output.json(&rows);
        return Ok(());
    }

    if rows.is_empty() {
        ctx.output.success("No product is low on stock.");
        return Ok(());
    }

    ctx.output.header("Low stock");
    ctx.output
        .table_row(&["PRODUCT", "ON HAND", "MINIMUM", "STATE"], &[30, 8, 8, 6]);
    for inv in &rows {
        let quantity = inv.quantity.to_string();
        let minimum = inv.minimum_stock_level.to_string();
        let state = status_badge(stock_state(inv));
        ctx.output.table_row(
            &[inv.product_id.as_str(), &quantity, &minimum, &state],
            &[30, 8, 8, 6],
        );
    }

    Ok(())
}

async fn show(ctx: &Context, product_id: &ProductId, history: bool) -> Result<()> {
    let ledger = ctx.orders.inventory();
    let inventory = ledger.get(product_id).await?;
    let adjustments = if history {
        ledger.adjustments(product_id).await?
    } else {
        Vec::new()
    };

    if ctx.output.is_json() {
        if history {
            ctx.output.json(&serde_json::json!({
                "inventory": inventory,
                "adjustments": adjustments,
            }));
        } else {
            ctx.output.json(&inventory);
        }
        return Ok(());
    }

    ctx.output.header(&format!("Inventory for {}", product_id));
    ctx.output.kv("On hand", &inventory.quantity.to_string());
    ctx.output.kv("State", &status_badge(stock_state(&inventory)));
    ctx.output
        .kv("Minimum level", &inventory.minimum_stock_level.to_string());
    ctx.output
        .kv("Maximum level", &inventory.maximum_stock_level.to_string());
    if let Some(ts) = inventory.last_restock_date {
        ctx.output.kv("Last restock", &format_timestamp(ts));
    }
    if let Some(ts) = inventory.last_stock_out_date {
        ctx.output.kv("Last stock-out", &format_timestamp(ts));
    }
    ctx.output.kv("Updated", &format_timestamp(inventory.updated_at));

    if history {
        ctx.output.header("Adjustments");
        if adjustments.is_empty() {
            ctx.output.info("No adjustments recorded.");
        }
        for adj in &adjustments {
            let order = adj
                .order_id
                .as_ref()
                .map(|id| format!(" (order {})", id))
                .unwrap_or_default();
            ctx.output.list_item(&format!(
                "{}  {:+}  -> {}  {}{}",
                format_timestamp(adj.timestamp),
                adj.quantity_change,
                adj.quantity_after,
                adj.reason.as_str(),
                order
            ));
        }
    }

    Ok(())
}
