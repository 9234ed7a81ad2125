//! Storefront order pipeline services.
//!
//! Services over the [`storefront_db`] store:
//!
//! - [`DiscountResolver`]: code and membership discount resolution, redemption
//!   ledger, discount administration
//! - [`InventoryLedger`]: the only writer of stock quantities
//! - [`OrderService`]: checkout and the order status state machine
//! - [`AutoConfirmSweep`]: periodic confirmation of pending orders
//!
//! Writes go through optimistic transactions. A transaction that loses a race
//! fails with a conflict and is re-run by a [`RetryPolicy`], which is how
//! concurrent deductions against one product are serialized.
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_orders::prelude::*;
//!
//! let db = Db::open_in_memory();
//! let orders = OrderService::new(db.clone(), PricingConfig::default());
//!
//! let request = CheckoutRequest::new(cart, customer, PaymentMethod::CashOnDelivery)
//!     .with_discount_code("SAVE10");
//! let placed = orders.create_order(request).await?;
//! orders.update_status(&placed.order.id, OrderStatus::Processing).await?;
//! ```

pub mod catalog;
pub mod collaborators;
pub mod config;
pub mod discounts;
pub mod inventory;
pub mod membership;
pub mod orders;
pub mod repository;
pub mod retry;
pub mod settings;
pub mod sweep;
pub mod tasks;

pub use catalog::CatalogService;
pub use collaborators::{
    InvoiceGenerator, LogNotifier, MembershipTracker, NoopMembershipTracker, NotificationError,
    Notifier, OfflinePaymentGateway, PaymentGateway, PaymentRequest, PaymentResult,
    PlainTextInvoice,
};
pub use config::{MembershipConfig, PricingConfig, SweepConfig};
pub use discounts::{DiscountListing, DiscountResolver};
pub use inventory::{InventoryLedger, StockChange};
pub use membership::StoreMembershipTracker;
pub use orders::{CheckoutRequest, OrderFilter, OrderService, PlacedOrder};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use settings::SettingsStore;
pub use sweep::{AutoConfirmSweep, SweepReport};
pub use tasks::{BackgroundTasks, TaskKind};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        AutoConfirmSweep, BackgroundTasks, CatalogService, CheckoutRequest, DiscountResolver,
        InventoryLedger, MembershipConfig, MembershipTracker, Notifier, OrderFilter, OrderService,
        PaymentGateway, PricingConfig, RetryPolicy, SettingsStore, StoreMembershipTracker,
        SweepReport, TaskKind,
    };
    pub use storefront_commerce::prelude::*;
    pub use storefront_db::Db;
}
