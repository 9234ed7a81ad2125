//! CLI command implementations.

pub mod discount;
pub mod init;
pub mod inventory;
pub mod membership_discount;
pub mod order;
pub mod product;
pub mod settings;
pub mod sweep;

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use storefront_commerce::cart::DiscountValue;
use storefront_commerce::Money;

/// Arguments for the init command.
#[derive(Args)]
pub struct InitArgs {
    /// Where to write the config file.
    #[arg(default_value = "storefront.toml")]
    pub path: String,

    /// Overwrite an existing file.
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the product command.
#[derive(Args)]
pub struct ProductArgs {
    #[command(subcommand)]
    pub command: ProductCommand,
}

#[derive(Subcommand)]
pub enum ProductCommand {
    /// Add a product to the catalog.
    Add {
        /// Stock keeping unit, unique in the catalog.
        sku: String,
        /// Display name.
        name: String,
        /// Unit price in minor units.
        #[arg(long)]
        price: i64,
        /// Opening stock.
        #[arg(long, default_value_t = 0)]
        stock: i64,
        /// Product id (generated when omitted).
        #[arg(long)]
        id: Option<String>,
    },
    /// List all products.
    List,
    /// Change a product's price.
    SetPrice {
        product: String,
        /// New unit price in minor units.
        price: i64,
    },
    /// Change a product's status (draft, active, archived).
    SetStatus { product: String, status: String },
}

/// Arguments for the inventory command.
#[derive(Args)]
pub struct InventoryArgs {
    #[command(subcommand)]
    pub command: InventoryCommand,
}

#[derive(Subcommand)]
pub enum InventoryCommand {
    /// Add stock to a product.
    Restock { product: String, quantity: i64 },
    /// Remove stock from a product.
    Deduct { product: String, quantity: i64 },
    /// Overwrite the on-hand quantity after a stock count.
    Set { product: String, quantity: i64 },
    /// Change the low-stock and overstock levels.
    Levels {
        product: String,
        #[arg(long)]
        min: i64,
        #[arg(long)]
        max: i64,
    },
    /// Re-align inventory records with product stock.
    Sync,
    /// List products at or below their minimum level.
    LowStock,
    /// Show a product's inventory record.
    Show {
        product: String,
        /// Include the adjustment history.
        #[arg(long)]
        history: bool,
    },
}

/// How a discount is specified on the command line.
#[derive(Args)]
pub struct DiscountValueArgs {
    /// Percentage off, in (0, 100].
    #[arg(long, conflicts_with = "fixed", required_unless_present = "fixed")]
    pub percent: Option<f64>,

    /// Fixed amount off, in minor units.
    #[arg(long)]
    pub fixed: Option<i64>,

    /// Minimum subtotal, in minor units.
    #[arg(long, default_value_t = 0)]
    pub min_order: i64,

    /// Cap on a percentage discount, in minor units.
    #[arg(long)]
    pub max_discount: Option<i64>,

    /// First valid day (YYYY-MM-DD or RFC 3339). Defaults to now.
    #[arg(long)]
    pub starts: Option<String>,

    /// Last valid moment (YYYY-MM-DD or RFC 3339).
    #[arg(long)]
    pub ends: Option<String>,
}

impl DiscountValueArgs {
    pub fn value(&self, to_money: impl Fn(i64) -> Money) -> Result<DiscountValue> {
        match (self.percent, self.fixed) {
            (Some(percent), None) => Ok(DiscountValue::Percentage(percent)),
            (None, Some(amount)) => Ok(DiscountValue::Fixed(to_money(amount))),
            _ => bail!("Specify exactly one of --percent or --fixed"),
        }
    }
}

/// Arguments for the discount command.
#[derive(Args)]
pub struct DiscountArgs {
    #[command(subcommand)]
    pub command: DiscountCommand,
}

#[derive(Subcommand)]
pub enum DiscountCommand {
    /// Create a discount code.
    Add {
        /// Code customers enter at checkout (case-sensitive).
        code: String,
        /// Display name.
        name: String,
        #[command(flatten)]
        value: DiscountValueArgs,
        /// Maximum number of redemptions.
        #[arg(long)]
        usage_limit: Option<i64>,
    },
    /// List discount codes.
    List,
    /// Stop a discount code from applying.
    Deactivate { code: String },
    /// Delete a discount code.
    Delete { code: String },
}

/// Arguments for the membership-discount command.
#[derive(Args)]
pub struct MembershipDiscountArgs {
    #[command(subcommand)]
    pub command: MembershipDiscountCommand,
}

#[derive(Subcommand)]
pub enum MembershipDiscountCommand {
    /// Create a discount for a membership tier.
    Add {
        /// Tier (regular, silver, gold, diamond).
        level: String,
        /// Display name.
        name: String,
        #[command(flatten)]
        value: DiscountValueArgs,
    },
    /// List membership discounts.
    List {
        /// Only this tier.
        #[arg(long)]
        level: Option<String>,
    },
    /// Stop a membership discount from applying.
    Deactivate { id: String },
}

/// Arguments for the order command.
#[derive(Args)]
pub struct OrderArgs {
    #[command(subcommand)]
    pub command: OrderCommand,
}

/// Checkout details for `order place`.
#[derive(Args)]
pub struct PlaceArgs {
    /// Line as PRODUCT_ID:QUANTITY. Repeat for several lines.
    #[arg(long = "item", required = true)]
    pub items: Vec<String>,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub phone: String,

    /// Shipping address.
    #[arg(long)]
    pub address: String,

    #[arg(long)]
    pub note: Option<String>,

    /// Payment method (cod, bank_transfer, card, ewallet).
    #[arg(long, default_value = "cod")]
    pub payment: String,

    /// Discount code.
    #[arg(long)]
    pub discount: Option<String>,

    /// Registered customer id. Guests are identified by --session.
    #[arg(long)]
    pub user: Option<String>,

    /// Guest session token.
    #[arg(long)]
    pub session: Option<String>,

    /// Client key that makes retried submissions return the same order.
    #[arg(long)]
    pub idempotency_key: Option<String>,

    /// Price the cart without placing the order.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum OrderCommand {
    /// Place an order.
    Place(PlaceArgs),
    /// Show an order.
    Show { id: String },
    /// List orders, newest first.
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        session: Option<String>,
        /// Show only the first N orders.
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Move an order to a new status.
    Status {
        id: String,
        /// pending, processing, shipped, delivered, cancelled or refunded.
        status: String,
    },
    /// Delete a pending order.
    Delete { id: String },
    /// Render an order's invoice.
    Invoice {
        id: String,
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        out: Option<String>,
    },
    /// Record a manual payment.
    MarkPaid {
        id: String,
        /// Bank or gateway reference.
        #[arg(long)]
        transaction: Option<String>,
    },
}

/// Arguments for the settings command.
#[derive(Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show auto-confirmation settings.
    Show,
    /// Change auto-confirmation settings. Omitted fields keep their value.
    Set {
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        delay_minutes: Option<i64>,
        #[arg(long)]
        exclude_cod: Option<bool>,
        #[arg(long)]
        exclude_high_value: Option<bool>,
        /// In minor units.
        #[arg(long)]
        high_value_threshold: Option<i64>,
    },
}

/// Arguments for the sweep command.
#[derive(Args)]
pub struct SweepArgs {
    #[command(subcommand)]
    pub command: SweepCommand,
}

#[derive(Subcommand)]
pub enum SweepCommand {
    /// Run one cycle and exit.
    Once,
    /// Sweep periodically until interrupted.
    Run,
}
