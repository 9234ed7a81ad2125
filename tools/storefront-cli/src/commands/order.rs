//! Order commands.

use anyhow::{anyhow, bail, Context as _, Result};
use storefront_commerce::cart::{Cart, PricingBreakdown};
use storefront_commerce::checkout::{CustomerInfo, Order, OrderStatus, PaymentMethod};
use storefront_commerce::membership::MembershipLevel;
use storefront_commerce::{current_timestamp, OrderId, ProductId, UserId};
use storefront_orders::{CheckoutRequest, OrderFilter};

use super::{OrderArgs, OrderCommand, PlaceArgs};
use crate::context::Context;
use crate::output::{format_timestamp, status_badge};

/// Run the order command.
pub async fn run(args: OrderArgs, ctx: &Context) -> Result<()> {
    match args.command {
        OrderCommand::Place(place) => place_order(place, ctx).await,
        OrderCommand::Show { id } => {
            let order = ctx.orders.get_order(&OrderId::new(id)).await?;
            if ctx.output.is_json() {
                ctx.output.json(&order);
                return Ok(());
            }
            let level = match &order.user_id {
                Some(user) => Some(ctx.membership.level_of(user).await?),
                None => None,
            };
            print_order(ctx, &order, level);
            Ok(())
        }
        OrderCommand::List {
            status,
            user,
            session,
            limit,
        } => {
            let filter = OrderFilter {
                status: status.as_deref().map(parse_status).transpose()?,
                user_id: user.map(UserId::new),
                session_token: session,
            };
            list_orders(ctx, &filter, limit).await
        }
        OrderCommand::Status { id, status } => {
            let next = parse_status(&status)?;
            let order = ctx.orders.update_status(&OrderId::new(id), next).await?;
            if ctx.output.is_json() {
                ctx.output.json(&order);
                return Ok(());
            }
            ctx.output.success(&format!(
                "Order {} is now {} (payment {})",
                order.id,
                order.status,
                order.payment_status
            ));
            Ok(())
        }
        OrderCommand::Delete { id } => {
            let id = OrderId::new(id);
            ctx.orders.delete_order(&id).await?;
            if ctx.output.is_json() {
                ctx.output.json(&serde_json::json!({ "deleted": id }));
                return Ok(());
            }
            ctx.output.success(&format!("Deleted order {}", id));
            Ok(())
        }
        OrderCommand::Invoice { id, out } => {
            let invoice = ctx.orders.invoice(&OrderId::new(id)).await?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &invoice)
                        .with_context(|| format!("Failed to write invoice: {}", path))?;
                    ctx.output.success(&format!("Invoice written to {}", path));
                }
                None => print!("{}", String::from_utf8_lossy(&invoice)),
            }
            Ok(())
        }
        OrderCommand::MarkPaid { id, transaction } => {
            let order = ctx
                .orders
                .mark_paid(&OrderId::new(id), transaction)
                .await?;
            if ctx.output.is_json() {
                ctx.output.json(&order);
                return Ok(());
            }
            ctx.output.success(&format!("Order {} marked as paid", order.id));
            Ok(())
        }
    }
}

fn parse_status(s: &str) -> Result<OrderStatus> {
    OrderStatus::parse(s).ok_or_else(|| anyhow!("Unknown order status: {}", s))
}

/// Split a `PRODUCT_ID:QUANTITY` argument. The quantity defaults to 1.
fn parse_item(item: &str) -> Result<(ProductId, i64)> {
    let (product, quantity) = match item.rsplit_once(':') {
        Some((product, quantity)) => {
            let quantity = quantity
                .trim()
                .parse::<i64>()
                .with_context(|| format!("Invalid quantity in '{}'", item))?;
            (product, quantity)
        }
        None => (item, 1),
    };
    let product = product.trim();
    if product.is_empty() {
        bail!("Missing product id in '{}'", item);
    }
    Ok((ProductId::new(product), quantity))
}

/// Build a cart at current catalog prices.
async fn build_cart(args: &PlaceArgs, ctx: &Context) -> Result<Cart> {
    let currency = ctx.config.pricing.currency;
    let session = args
        .session
        .clone()
        .unwrap_or_else(|| format!("cli-{}", current_timestamp()));
    let mut cart = match &args.user {
        Some(user) => Cart::for_user(UserId::new(user.as_str()), session, currency),
        None => Cart::new(session, currency),
    };

    for item in &args.items {
        let (product_id, quantity) = parse_item(item)?;
        let product = ctx.catalog.get_product(&product_id).await?;
        cart.add_item(product.id, product.name, quantity, product.price)?;
    }
    Ok(cart)
}

async fn place_order(args: PlaceArgs, ctx: &Context) -> Result<()> {
    let method = PaymentMethod::parse(&args.payment)
        .ok_or_else(|| anyhow!("Unknown payment method: {}", args.payment))?;
    let cart = build_cart(&args, ctx).await?;

    if args.dry_run {
        let breakdown = ctx.orders.preview(&cart, args.discount.as_deref()).await?;
        if ctx.output.is_json() {
            ctx.output.json(&breakdown);
            return Ok(());
        }
        ctx.output.header("Price preview");
        print_breakdown(ctx, &breakdown);
        return Ok(());
    }

    let mut customer = CustomerInfo::new(args.name, args.email, args.phone, args.address);
    if let Some(note) = args.note {
        customer = customer.with_note(note);
    }
    let mut request = CheckoutRequest::new(cart, customer, method);
    if let Some(code) = args.discount {
        request = request.with_discount_code(code);
    }
    if let Some(key) = args.idempotency_key {
        request = request.with_idempotency_key(key);
    }

    let placed = ctx.orders.create_order(request).await?;

    if ctx.output.is_json() {
        ctx.output.json(&placed.order);
        return Ok(());
    }

    if placed.created {
        ctx.output.success(&format!("Placed order {}", placed.order.id));
    } else {
        ctx.output.info(&format!(
            "Order {} already exists for this idempotency key",
            placed.order.id
        ));
    }
    ctx.output.kv("Total", &placed.order.total.display());
    ctx.output.kv("Payment", &status_badge(placed.order.payment_status.as_str()));
    if let Some(url) = &placed.redirect_url {
        ctx.output.kv("Pay at", url);
    }
    Ok(())
}

fn print_breakdown(ctx: &Context, breakdown: &PricingBreakdown) {
    ctx.output.kv("Subtotal", &breakdown.subtotal.display());
    for discount in &breakdown.discounts {
        ctx.output.kv(
            &format!("Discount ({})", discount.name),
            &format!("-{}", discount.amount.display()),
        );
    }
    ctx.output.kv("Shipping", &breakdown.shipping_fee.display());
    ctx.output.kv("Total", &breakdown.total.display());
}

fn print_order(ctx: &Context, order: &Order, level: Option<MembershipLevel>) {
    ctx.output.header(&format!("Order {}", order.id));
    ctx.output.kv("Status", &status_badge(order.status.as_str()));
    ctx.output.kv(
        "Payment",
        &format!(
            "{} ({})",
            order.payment_method,
            status_badge(order.payment_status.as_str())
        ),
    );
    if let Some(tx) = &order.transaction_id {
        ctx.output.kv("Transaction", tx);
    }
    ctx.output.kv("Placed", &format_timestamp(order.created_at));
    ctx.output.kv("Updated", &format_timestamp(order.updated_at));
    match (&order.user_id, &order.session_token) {
        (Some(user), _) => {
            let level = level.unwrap_or_default();
            ctx.output
                .kv("Customer", &format!("{} ({} member)", user, level.as_str()));
        }
        (None, Some(session)) => ctx.output.kv("Guest session", session),
        (None, None) => {}
    }

    ctx.output.header("Ship to");
    ctx.output.kv("Name", &order.customer.name);
    ctx.output.kv("Email", &order.customer.email);
    ctx.output.kv("Phone", &order.customer.phone);
    ctx.output.kv("Address", &order.customer.address);
    if let Some(note) = &order.customer.note {
        ctx.output.kv("Note", note);
    }

    ctx.output.header("Items");
    for line in &order.line_items {
        ctx.output.list_item(&format!(
            "{} x{} @ {} = {}",
            line.product_name,
            line.quantity,
            line.unit_price.display(),
            line.line_total.display()
        ));
    }

    ctx.output.header("Totals");
    ctx.output.kv("Subtotal", &order.subtotal.display());
    for discount in &order.applied_discounts {
        ctx.output.kv(
            &format!("Discount ({})", discount.name),
            &format!("-{}", discount.amount.display()),
        );
    }
    ctx.output.kv("Shipping", &order.shipping_fee.display());
    ctx.output.kv("Total", &order.total.display());
}

async fn list_orders(ctx: &Context, filter: &OrderFilter, limit: Option<usize>) -> Result<()> {
    let mut orders = ctx.orders.list_orders(filter).await?;
    if let Some(limit) = limit {
        orders.truncate(limit);
    }

    if ctx.output.is_json() {
        ctx.output.json(&orders);
        return Ok(());
    }

    if orders.is_empty() {
        ctx.output.info("No matching orders.");
        return Ok(());
    }

    let widths = [28, 20, 12, 12, 16];
    ctx.output
        .table_row(&["ID", "PLACED", "STATUS", "PAYMENT", "TOTAL"], &widths);
    for order in &orders {
        let placed = format_timestamp(order.created_at);
        let status = status_badge(order.status.as_str());
        let payment = status_badge(order.payment_status.as_str());
        let total = order.total.display();
        ctx.output.table_row(
            &[order.id.as_str(), &placed, &status, &payment, &total],
            &widths,
        );
    }
    ctx.output.info("");
    ctx.output.info(&format!("Total: {} order(s)", orders.len()));

    Ok(())
}
