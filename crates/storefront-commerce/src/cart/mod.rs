//! Shopping cart module.
//!
//! Contains types for cart, line items, pricing, and discounts.

mod cart;
mod discount;
mod pricing;

pub use cart::{Cart, LineItem, MAX_QUANTITY_PER_ITEM};
pub use discount::{
    Discount, DiscountOutcome, DiscountPolicy, DiscountSource, DiscountTerms, DiscountValue,
    MembershipDiscount,
};
pub use pricing::{PricingBreakdown, ShippingPolicy};
