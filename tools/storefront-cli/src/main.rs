//! Storefront CLI - operate the order pipeline from the command line.
//!
//! Commands:
//! - `storefront init` - Write a default configuration file
//! - `storefront product` - Manage the catalog
//! - `storefront inventory` - Restock, deduct and inspect stock
//! - `storefront discount` - Manage discount codes
//! - `storefront membership-discount` - Manage membership discounts
//! - `storefront order` - Place orders and drive their status
//! - `storefront settings` - Auto-confirmation settings
//! - `storefront sweep` - Run the auto-confirmation sweep

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use storefront_commerce::CommerceError;
use storefront_observability::LogLevel;

use commands::{
    DiscountArgs, InitArgs, InventoryArgs, MembershipDiscountArgs, OrderArgs, ProductArgs,
    SettingsArgs, SweepArgs,
};

/// Storefront CLI - manage products, discounts and orders
#[derive(Parser)]
#[command(name = "storefront")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init(InitArgs),

    /// Manage catalog products
    Product(ProductArgs),

    /// Inspect and adjust stock
    Inventory(InventoryArgs),

    /// Manage discount codes
    Discount(DiscountArgs),

    /// Manage membership discounts
    MembershipDiscount(MembershipDiscountArgs),

    /// Place and manage orders
    Order(OrderArgs),

    /// Show or change auto-confirmation settings
    Settings(SettingsArgs),

    /// Run the auto-confirmation sweep
    Sweep(SweepArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // `init` must work before any config or store exists
    let command = match cli.command {
        Commands::Init(args) => {
            if let Err(e) = commands::init::run(args, &output) {
                output.error(&format!("{:#}", e));
                std::process::exit(1);
            }
            return Ok(());
        }
        other => other,
    };

    // Load config and open the store
    let config_path = cli.config.as_deref();
    let ctx = match context::Context::load(config_path, output.clone()).await {
        Ok(ctx) => ctx,
        Err(e) => {
            output.error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    let mut logging = ctx.config.logging.clone();
    if cli.verbose {
        logging = logging.with_level(LogLevel::Debug);
    }
    if let Err(e) = storefront_observability::init_logging(&logging) {
        ctx.output.warn(&format!("Logging disabled: {}", e));
    }

    // Execute command
    let result = match command {
        Commands::Init(_) => Ok(()),
        Commands::Product(args) => commands::product::run(args, &ctx).await,
        Commands::Inventory(args) => commands::inventory::run(args, &ctx).await,
        Commands::Discount(args) => commands::discount::run(args, &ctx).await,
        Commands::MembershipDiscount(args) => commands::membership_discount::run(args, &ctx).await,
        Commands::Order(args) => commands::order::run(args, &ctx).await,
        Commands::Settings(args) => commands::settings::run(args, &ctx).await,
        Commands::Sweep(args) => commands::sweep::run(args, &ctx).await,
    };

    if let Err(e) = result {
        report_error(&ctx.output, &e);
        std::process::exit(1);
    }

    Ok(())
}

/// Domain errors the operator can act on are printed as they are; anything
/// else is logged with its cause chain.
fn report_error(output: &output::Output, err: &anyhow::Error) {
    match err.downcast_ref::<CommerceError>() {
        Some(domain) if domain.is_user_actionable() => output.error(&domain.to_string()),
        _ => {
            tracing::error!(error = ?err, "Command failed");
            output.error(&format!("{:#}", err));
        }
    }
}
