//! Commerce error types.

use crate::checkout::{OrderStatus, PaymentStatus};
use crate::money::Money;
use thiserror::Error;

/// Errors that can occur in storefront operations.
///
/// Everything except [`CommerceError::Database`], [`CommerceError::Overflow`]
/// and [`CommerceError::SerializationError`] is a validation failure that can
/// be shown to the customer or operator as is.
#[derive(Error, Debug)]
pub enum CommerceError {
    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Product not found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Checkout attempted with an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Not enough stock to cover a line item.
    #[error(
        "Insufficient inventory for {product_name} ({product_id}): requested {requested}, available {available}, short by {}",
        .requested - .available
    )]
    InsufficientInventory {
        product_id: String,
        product_name: String,
        requested: i64,
        available: i64,
    },

    /// Invalid quantity.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Quantity exceeds maximum allowed.
    #[error("Quantity {0} exceeds maximum allowed ({1})")]
    QuantityExceedsLimit(i64, i64),

    /// Illegal order status transition.
    #[error("Cannot change order status from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Illegal payment status change.
    #[error("Cannot mark payment as paid while it is {0}")]
    InvalidPaymentTransition(PaymentStatus),

    /// Only pending orders can be deleted.
    #[error("Order {order_id} cannot be deleted while {status}")]
    DeleteNotPermitted { order_id: String, status: OrderStatus },

    /// Unknown discount code.
    #[error("Discount not found: {0}")]
    DiscountNotFound(String),

    /// Discount window has ended.
    #[error("Discount expired: {0}")]
    DiscountExpired(String),

    /// Discount window has not started yet.
    #[error("Discount not yet active: {0}")]
    DiscountNotYetActive(String),

    /// Discount switched off by an administrator.
    #[error("Discount inactive: {0}")]
    DiscountInactive(String),

    /// Discount usage counter reached its limit.
    #[error("Discount usage limit reached: {0}")]
    DiscountLimitReached(String),

    /// Subtotal below the discount's minimum order amount.
    #[error("Discount {code} requires a minimum order of {minimum}, subtotal is {subtotal}")]
    MinimumOrderNotMet {
        code: String,
        minimum: Money,
        subtotal: Money,
    },

    /// Discount code already in use.
    #[error("Discount code already exists: {0}")]
    DuplicateDiscountCode(String),

    /// Payment gateway rejected or failed the payment.
    #[error("Payment failed: {0}")]
    PaymentError(String),

    /// Store failure. The cause is kept as the error source.
    #[error("Database error")]
    Database(#[from] storefront_db::DbError),

    /// Currency mismatch.
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    /// Arithmetic overflow.
    #[error("Arithmetic overflow in money calculation")]
    Overflow,

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl CommerceError {
    /// Whether the error describes something the caller can fix.
    pub fn is_user_actionable(&self) -> bool {
        !matches!(
            self,
            CommerceError::Database(_)
                | CommerceError::Overflow
                | CommerceError::SerializationError(_)
        )
    }

    /// Whether the whole operation may succeed if retried from scratch.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CommerceError::Database(e) if e.is_conflict())
    }
}

impl From<serde_json::Error> for CommerceError {
    fn from(e: serde_json::Error) -> Self {
        CommerceError::SerializationError(e.to_string())
    }
}
