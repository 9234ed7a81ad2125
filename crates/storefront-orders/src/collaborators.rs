//! External collaborators of the order pipeline.
//!
//! Payment, notification, invoice rendering and membership tracking live
//! outside this crate. The services talk to them through these traits; the
//! default implementations are enough to run the store offline.

use async_trait::async_trait;
use storefront_commerce::catalog::{Inventory, Product};
use storefront_commerce::checkout::{Order, PaymentMethod, StatusChange};
use storefront_commerce::{CommerceError, Money, OrderId, UserId};
use thiserror::Error;

/// A collaborator could not deliver a notification.
#[derive(Debug, Error)]
#[error("Notification failed: {0}")]
pub struct NotificationError(pub String);

/// Input for a payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: Money,
    /// Where an external payment page should send the customer back to.
    pub return_url: Option<String>,
}

/// Result of a payment attempt.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaymentResult {
    pub success: bool,
    /// Gateway reference for a cleared payment.
    pub transaction_id: Option<String>,
    /// External payment page, for redirect-based flows.
    pub redirect_url: Option<String>,
    /// Gateway message, mostly useful on failure.
    pub message: Option<String>,
}

impl PaymentResult {
    pub fn approved(transaction_id: Option<String>) -> Self {
        Self {
            success: true,
            transaction_id,
            ..Default::default()
        }
    }

    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Payment processing.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Attempt to collect payment for a newly reserved order.
    ///
    /// Called once per checkout, after the pending order is committed, with
    /// the committed total.
    async fn process_payment(&self, request: &PaymentRequest)
        -> Result<PaymentResult, CommerceError>;
}

/// Customer and operator notifications. Failures never affect the order.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_order_confirmation(&self, order: &Order) -> Result<(), NotificationError>;

    async fn send_order_status_update(
        &self,
        order: &Order,
        change: &StatusChange,
    ) -> Result<(), NotificationError>;

    async fn send_low_stock_notification(
        &self,
        product: &Product,
        inventory: &Inventory,
    ) -> Result<(), NotificationError>;
}

/// Invoice rendering. Read-only.
#[async_trait]
pub trait InvoiceGenerator: Send + Sync {
    async fn generate_invoice(&self, order: &Order) -> Result<Vec<u8>, CommerceError>;
}

/// Cumulative purchase tracking for membership tiers.
#[async_trait]
pub trait MembershipTracker: Send + Sync {
    /// Called once when an order reaches Delivered.
    async fn record_completed_order(
        &self,
        user_id: &UserId,
        order_amount: &Money,
    ) -> Result<(), CommerceError>;
}

/// Gateway for stores without an online payment provider.
///
/// Cash on delivery and bank transfers are accepted and stay unpaid until
/// collected. Card and e-wallet payments are declined.
#[derive(Debug, Clone, Default)]
pub struct OfflinePaymentGateway;

#[async_trait]
impl PaymentGateway for OfflinePaymentGateway {
    async fn process_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentResult, CommerceError> {
        if request.method.requires_synchronous_confirmation() {
            return Ok(PaymentResult::declined(format!(
                "{} payments need an online payment provider",
                request.method
            )));
        }
        Ok(PaymentResult::approved(None))
    }
}

/// Notifier that writes every notification to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_order_confirmation(&self, order: &Order) -> Result<(), NotificationError> {
        tracing::info!(
            order_id = %order.id,
            email = %order.customer.email,
            total = %order.total,
            "Order confirmation"
        );
        Ok(())
    }

    async fn send_order_status_update(
        &self,
        order: &Order,
        change: &StatusChange,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            order_id = %order.id,
            email = %order.customer.email,
            from = %change.from,
            to = %change.to,
            "Order status update"
        );
        Ok(())
    }

    async fn send_low_stock_notification(
        &self,
        product: &Product,
        inventory: &Inventory,
    ) -> Result<(), NotificationError> {
        tracing::warn!(
            product_id = %product.id,
            product = %product.name,
            quantity = inventory.quantity,
            minimum = inventory.minimum_stock_level,
            "Low stock"
        );
        Ok(())
    }
}

/// Plain-text invoice renderer.
#[derive(Debug, Clone, Default)]
pub struct PlainTextInvoice;

impl PlainTextInvoice {
    pub fn render(order: &Order) -> String {
        let mut lines = vec![
            format!("INVOICE {}", order.id),
            format!("Customer: {} <{}>", order.customer.name, order.customer.email),
            format!("Ship to:  {}", order.customer.address),
            format!("Payment:  {} ({})", order.payment_method, order.payment_status),
            String::new(),
        ];
        for item in &order.line_items {
            lines.push(format!(
                "{:<32} {:>4} x {:>14} = {:>14}",
                item.product_name,
                item.quantity,
                item.unit_price.display(),
                item.line_total.display()
            ));
        }
        lines.push(String::new());
        lines.push(format!("{:<20} {:>14}", "Subtotal", order.subtotal.display()));
        for discount in &order.applied_discounts {
            lines.push(format!(
                "{:<20} {:>14}",
                format!("Discount ({})", discount.name),
                format!("-{}", discount.amount.display())
            ));
        }
        lines.push(format!("{:<20} {:>14}", "Shipping", order.shipping_fee.display()));
        lines.push(format!("{:<20} {:>14}", "Total", order.total.display()));
        if let Some(tx) = &order.transaction_id {
            lines.push(format!("Transaction: {tx}"));
        }
        lines.join("\n") + "\n"
    }
}

#[async_trait]
impl InvoiceGenerator for PlainTextInvoice {
    async fn generate_invoice(&self, order: &Order) -> Result<Vec<u8>, CommerceError> {
        Ok(Self::render(order).into_bytes())
    }
}

/// Tracker that does nothing, for stores without memberships.
#[derive(Debug, Clone, Default)]
pub struct NoopMembershipTracker;

#[async_trait]
impl MembershipTracker for NoopMembershipTracker {
    async fn record_completed_order(&self, _: &UserId, _: &Money) -> Result<(), CommerceError> {
        Ok(())
    }
}
