//! Storefront domain types and rules.
//!
//! This crate holds the pure, I/O-free part of the order pipeline:
//!
//! - **Catalog**: products and per-product inventory records
//! - **Cart**: cart lines, discount rules, pricing breakdowns
//! - **Checkout**: orders, the status state machine, payment coupling,
//!   auto-confirmation settings
//! - **Membership**: tiers derived from cumulative purchases
//!
//! # Example
//!
//! ```rust
//! use storefront_commerce::prelude::*;
//!
//! let terms = DiscountTerms::new(DiscountValue::Percentage(10.0), 0)
//!     .with_maximum_discount(Money::new(40_000, Currency::VND));
//! let discount = Discount::new("SAVE10", "10% off", terms);
//!
//! let subtotal = Money::new(500_000, Currency::VND);
//! let outcome = discount.resolve(&subtotal, 1_700_000_000).unwrap();
//! assert_eq!(outcome.amount, Money::new(40_000, Currency::VND));
//! ```

pub mod error;
pub mod ids;
pub mod money;

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod membership;

pub use error::CommerceError;
pub use ids::*;
pub use money::{Currency, Money};

/// Get current Unix timestamp in seconds.
pub fn current_timestamp() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::current_timestamp;
    pub use crate::error::CommerceError;
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    // Catalog
    pub use crate::catalog::{AdjustmentReason, Inventory, InventoryAdjustment, Product, ProductStatus};

    // Cart
    pub use crate::cart::{
        Cart, Discount, DiscountOutcome, DiscountPolicy, DiscountSource, DiscountTerms,
        DiscountValue, LineItem, MembershipDiscount, PricingBreakdown, ShippingPolicy,
    };

    // Checkout
    pub use crate::checkout::{
        CustomerInfo, Eligibility, Order, OrderConfirmationSettings, OrderDraft, OrderLineItem,
        OrderStatus, PaymentMethod, PaymentStatus, StatusChange,
    };

    // Membership
    pub use crate::membership::{Customer, MembershipLevel, TierThresholds};
}
