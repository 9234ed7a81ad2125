//! Checkout module.
//!
//! Contains orders, the order status state machine, customer details and
//! auto-confirmation settings.

mod customer;
mod order;
mod settings;
mod status;

pub use customer::CustomerInfo;
pub use order::{Order, OrderDraft, OrderLineItem, StatusChange};
pub use settings::{Eligibility, OrderConfirmationSettings};
pub use status::{OrderStatus, PaymentMethod, PaymentStatus};
