//! Order types.

use crate::cart::{DiscountOutcome, PricingBreakdown};
use crate::catalog::Product;
use crate::checkout::{CustomerInfo, OrderStatus, PaymentMethod, PaymentStatus};
use crate::error::CommerceError;
use crate::ids::{OrderId, OrderLineItemId, ProductId, UserId};
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Who placed an order and how they pay.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderDraft {
    /// Signed-in customer, if any.
    pub user_id: Option<UserId>,
    /// Guest session token, if any.
    pub session_token: Option<String>,
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
    /// Client-supplied key that makes checkout idempotent.
    pub idempotency_key: Option<String>,
}

/// A placed order.
///
/// Invariants: `total == subtotal - discount_amount + shipping_fee`,
/// `0 <= discount_amount <= subtotal` and `total >= 0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,
    /// Customer user ID (None for guest checkout).
    pub user_id: Option<UserId>,
    /// Guest session token.
    pub session_token: Option<String>,
    /// Order status.
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// Subtotal before discounts.
    pub subtotal: Money,
    /// Total discount amount.
    pub discount_amount: Money,
    /// Shipping cost.
    pub shipping_fee: Money,
    /// Amount due.
    pub total: Money,
    /// Discounts applied at checkout.
    pub applied_discounts: Vec<DiscountOutcome>,
    /// Contact and shipping details.
    pub customer: CustomerInfo,
    /// Items in the order. Owned by the order and deleted with it.
    pub line_items: Vec<OrderLineItem>,
    /// Gateway transaction reference.
    pub transaction_id: Option<String>,
    /// Client idempotency key used at checkout.
    pub idempotency_key: Option<String>,
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Unix timestamp of last update.
    pub updated_at: i64,
}

/// What a status change did to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub payment_before: PaymentStatus,
    pub payment_after: PaymentStatus,
}

impl StatusChange {
    /// Whether the line item quantities must go back into stock.
    pub fn returns_stock(&self) -> bool {
        self.to.returns_stock()
    }
}

impl Order {
    /// Build a pending order from priced line items.
    pub fn new(
        id: OrderId,
        draft: OrderDraft,
        line_items: Vec<OrderLineItem>,
        pricing: PricingBreakdown,
        now: i64,
    ) -> Result<Self, CommerceError> {
        if line_items.is_empty() {
            return Err(CommerceError::EmptyCart);
        }

        let order = Self {
            id,
            user_id: draft.user_id,
            session_token: draft.session_token,
            status: OrderStatus::Pending,
            payment_method: draft.payment_method,
            payment_status: PaymentStatus::Pending,
            subtotal: pricing.subtotal,
            discount_amount: pricing.discount_total,
            shipping_fee: pricing.shipping_fee,
            total: pricing.total,
            applied_discounts: pricing.discounts,
            customer: draft.customer,
            line_items,
            transaction_id: None,
            idempotency_key: draft.idempotency_key,
            created_at: now,
            updated_at: now,
        };
        order.verify_totals()?;
        Ok(order)
    }

    /// Check the monetary invariants.
    pub fn verify_totals(&self) -> Result<(), CommerceError> {
        let line_sum = Money::try_sum(
            self.line_items.iter().map(|i| &i.line_total),
            self.subtotal.currency,
        )
        .ok_or(CommerceError::Overflow)?;
        let expected_total = self
            .subtotal
            .try_subtract(&self.discount_amount)
            .and_then(|m| m.try_add(&self.shipping_fee))
            .ok_or(CommerceError::Overflow)?;

        let consistent = line_sum == self.subtotal
            && !self.discount_amount.is_negative()
            && self.discount_amount.amount <= self.subtotal.amount
            && expected_total == self.total
            && !self.total.is_negative();
        if !consistent {
            return Err(CommerceError::ValidationError(format!(
                "order {} totals are inconsistent: subtotal {}, discount {}, shipping {}, total {}",
                self.id, self.subtotal, self.discount_amount, self.shipping_fee, self.total
            )));
        }
        Ok(())
    }

    /// Move to `next`, coupling the payment status to the new state.
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        now: i64,
    ) -> Result<StatusChange, CommerceError> {
        if !self.status.can_transition_to(next) {
            return Err(CommerceError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }

        let change = StatusChange {
            from: self.status,
            to: next,
            payment_before: self.payment_status,
            payment_after: self
                .payment_status
                .after_transition(next, self.payment_method),
        };
        self.status = next;
        self.payment_status = change.payment_after;
        self.updated_at = now;
        Ok(change)
    }

    /// Record a payment that cleared.
    pub fn mark_paid(
        &mut self,
        transaction_id: Option<String>,
        now: i64,
    ) -> Result<(), CommerceError> {
        let payable = matches!(
            self.payment_status,
            PaymentStatus::Pending | PaymentStatus::Failed
        ) && !self.status.is_terminal();
        if !payable {
            return Err(CommerceError::InvalidPaymentTransition(self.payment_status));
        }
        self.payment_status = PaymentStatus::Completed;
        if transaction_id.is_some() {
            self.transaction_id = transaction_id;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Check the order can be deleted outright.
    pub fn ensure_deletable(&self) -> Result<(), CommerceError> {
        if !self.status.can_delete() {
            return Err(CommerceError::DeleteNotPermitted {
                order_id: self.id.to_string(),
                status: self.status,
            });
        }
        Ok(())
    }

    /// Get total item count.
    pub fn item_count(&self) -> i64 {
        self.line_items.iter().map(|i| i.quantity).sum()
    }

    /// Codes of the code discounts redeemed by this order.
    pub fn discount_codes(&self) -> impl Iterator<Item = &str> {
        self.applied_discounts.iter().filter_map(|d| d.source.code())
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Completed
    }
}

/// A line item in an order.
///
/// Name and price are copied from the product when the order is placed and
/// never change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLineItem {
    /// Unique line item identifier.
    pub id: OrderLineItemId,
    /// Product ID.
    pub product_id: ProductId,
    /// Product name at time of order.
    pub product_name: String,
    /// Unit price at time of order.
    pub unit_price: Money,
    /// Quantity ordered.
    pub quantity: i64,
    /// unit_price * quantity.
    pub line_total: Money,
}

impl OrderLineItem {
    /// Snapshot a product for an order line.
    pub fn snapshot(product: &Product, quantity: i64) -> Result<Self, CommerceError> {
        if quantity <= 0 {
            return Err(CommerceError::InvalidQuantity(quantity));
        }
        if product.price.is_negative() {
            return Err(CommerceError::ValidationError(format!(
                "product {} has a negative price",
                product.id
            )));
        }
        let line_total = product
            .price
            .try_multiply(quantity)
            .ok_or(CommerceError::Overflow)?;
        Ok(Self {
            id: OrderLineItemId::generate(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            unit_price: product.price,
            quantity,
            line_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::ShippingPolicy;
    use crate::money::Currency;

    fn vnd(amount: i64) -> Money {
        Money::new(amount, Currency::VND)
    }

    fn pending_order(method: PaymentMethod) -> Order {
        let product = Product::new("MUG", "Mug", vnd(100_000), 10).unwrap();
        let items = vec![OrderLineItem::snapshot(&product, 3).unwrap()];
        let shipping = ShippingPolicy {
            flat_fee: vnd(30_000),
            free_shipping_threshold: None,
        };
        let pricing = PricingBreakdown::compute(vnd(300_000), vec![], &shipping).unwrap();
        let draft = OrderDraft {
            payment_method: method,
            customer: CustomerInfo::new("An", "an@example.com", "090", "1 Le Loi"),
            ..Default::default()
        };
        Order::new(OrderId::new("ord-1"), draft, items, pricing, 1_000).unwrap()
    }

    #[test]
    fn test_new_order_is_pending_with_consistent_totals() {
        let order = pending_order(PaymentMethod::CashOnDelivery);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.total, vnd(330_000));
        assert_eq!(order.item_count(), 3);
    }

    #[test]
    fn test_empty_order_rejected() {
        let pricing =
            PricingBreakdown::compute(vnd(0), vec![], &ShippingPolicy::free(Currency::VND))
                .unwrap();
        let result = Order::new(OrderId::new("ord-x"), OrderDraft::default(), vec![], pricing, 0);
        assert!(matches!(result, Err(CommerceError::EmptyCart)));
    }

    #[test]
    fn test_lifecycle_with_cod_payment() {
        let mut order = pending_order(PaymentMethod::CashOnDelivery);
        order.transition_to(OrderStatus::Processing, 1).unwrap();
        order.transition_to(OrderStatus::Shipped, 2).unwrap();
        let change = order.transition_to(OrderStatus::Delivered, 3).unwrap();
        assert_eq!(change.payment_after, PaymentStatus::Completed);
        assert!(!change.returns_stock());
        assert_eq!(order.updated_at, 3);
    }

    #[test]
    fn test_illegal_transition_leaves_order_unchanged() {
        let mut order = pending_order(PaymentMethod::Card);
        let err = order.transition_to(OrderStatus::Delivered, 5).unwrap_err();
        assert!(matches!(err, CommerceError::InvalidStatusTransition { .. }));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.updated_at, 1_000);
    }

    #[test]
    fn test_cancel_returns_stock_and_fails_payment() {
        let mut order = pending_order(PaymentMethod::BankTransfer);
        let change = order.transition_to(OrderStatus::Cancelled, 9).unwrap();
        assert!(change.returns_stock());
        assert_eq!(order.payment_status, PaymentStatus::Failed);
    }

    #[test]
    fn test_mark_paid() {
        let mut order = pending_order(PaymentMethod::BankTransfer);
        order.mark_paid(Some("tx-77".to_string()), 2).unwrap();
        assert!(order.is_paid());
        assert!(order.mark_paid(None, 3).is_err());
    }

    #[test]
    fn test_only_pending_orders_deletable() {
        let mut order = pending_order(PaymentMethod::CashOnDelivery);
        assert!(order.ensure_deletable().is_ok());
        order.transition_to(OrderStatus::Processing, 2).unwrap();
        assert!(matches!(
            order.ensure_deletable(),
            Err(CommerceError::DeleteNotPermitted { .. })
        ));
    }

    #[test]
    fn test_tampered_totals_detected() {
        let mut order = pending_order(PaymentMethod::CashOnDelivery);
        order.total = vnd(1);
        assert!(order.verify_totals().is_err());
    }
}
