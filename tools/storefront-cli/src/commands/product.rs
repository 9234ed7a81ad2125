//! Catalog commands.

use anyhow::{anyhow, Result};
use storefront_commerce::catalog::{Product, ProductStatus};
use storefront_commerce::ProductId;

use super::{ProductArgs, ProductCommand};
use crate::context::Context;
use crate::output::status_badge;

/// Run the product command.
pub async fn run(args: ProductArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ProductCommand::Add {
            sku,
            name,
            price,
            stock,
            id,
        } => {
            let mut product = Product::new(sku, name, ctx.config.pricing.money(price), stock)?;
            if let Some(id) = id {
                product = product.with_id(id);
            }
            let product = ctx.catalog.add_product(product).await?;

            if ctx.output.is_json() {
                ctx.output.json(&product);
                return Ok(());
            }
            ctx.output.success(&format!("Added {} ({})", product.name, product.id));
            Ok(())
        }
        ProductCommand::List => list_products(ctx).await,
        ProductCommand::SetPrice { product, price } => {
            let product = ctx
                .catalog
                .set_price(&ProductId::new(product), ctx.config.pricing.money(price))
                .await?;
            if ctx.output.is_json() {
                ctx.output.json(&product);
                return Ok(());
            }
            ctx.output
                .success(&format!("{} now costs {}", product.name, product.price.display()));
            Ok(())
        }
        ProductCommand::SetStatus { product, status } => {
            let status = ProductStatus::parse(&status)
                .ok_or_else(|| anyhow!("Unknown product status: {}", status))?;
            let product = ctx
                .catalog
                .set_status(&ProductId::new(product), status)
                .await?;
            if ctx.output.is_json() {
                ctx.output.json(&product);
                return Ok(());
            }
            ctx.output
                .success(&format!("{} is now {}", product.name, product.status.as_str()));
            Ok(())
        }
    }
}

async fn list_products(ctx: &Context) -> Result<()> {
    let products = ctx.catalog.list_products().await?;

    if ctx.output.is_json() {
        ctx.output.json(&products);
        return Ok(());
    }

    if products.is_empty() {
        ctx.output.info("No products yet.");
        ctx.output.info("Run `storefront product add` to create one.");
        return Ok(());
    }

    ctx.output.header("Products");
    ctx.output.table_row(
        &["ID", "SKU", "NAME", "PRICE", "STOCK", "STATUS"],
        &[30, 12, 24, 16, 8, 10],
    );
    for p in &products {
        let stock = p.stock.to_string();
        let price = p.price.display();
        let status = status_badge(p.status.as_str());
        ctx.output.table_row(
            &[p.id.as_str(), &p.sku, &p.name, &price, &stock, &status],
            &[30, 12, 24, 16, 8, 10],
        );
    }
    ctx.output.info("");
    ctx.output.info(&format!("Total: {} product(s)", products.len()));

    Ok(())
}
