//! Order state machine service.
//!
//! [`OrderService`] is the only writer of order status. Every status change
//! and the inventory movement it causes are committed in one transaction.
//! Collaborator side effects (notifications, membership tracking) run after
//! the commit and never undo it.

use crate::collaborators::{
    InvoiceGenerator, LogNotifier, MembershipTracker, NoopMembershipTracker, Notifier,
    OfflinePaymentGateway, PaymentGateway, PaymentRequest, PaymentResult, PlainTextInvoice,
};
use crate::config::PricingConfig;
use crate::discounts::DiscountResolver;
use crate::inventory::{InventoryLedger, StockChange};
use crate::repository::{self, tables};
use crate::retry::RetryPolicy;
use std::sync::Arc;
use storefront_commerce::cart::{Cart, PricingBreakdown};
use storefront_commerce::checkout::{
    CustomerInfo, Order, OrderDraft, OrderLineItem, OrderStatus, PaymentMethod, StatusChange,
};
use storefront_commerce::membership::MembershipLevel;
use storefront_commerce::{current_timestamp, CommerceError, Money, OrderId, UserId};
use storefront_db::{Db, Transaction};
use tracing::instrument;

/// Everything needed to turn a cart into an order.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub cart: Cart,
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
    /// Discount code entered by the customer, if any.
    pub discount_code: Option<String>,
    /// Client key that makes retried checkouts return the same order.
    pub idempotency_key: Option<String>,
    /// Where an external payment page should return to.
    pub return_url: Option<String>,
}

impl CheckoutRequest {
    pub fn new(cart: Cart, customer: CustomerInfo, payment_method: PaymentMethod) -> Self {
        Self {
            cart,
            customer,
            payment_method,
            discount_code: None,
            idempotency_key: None,
            return_url: None,
        }
    }

    pub fn with_discount_code(mut self, code: impl Into<String>) -> Self {
        self.discount_code = Some(code.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_return_url(mut self, url: impl Into<String>) -> Self {
        self.return_url = Some(url.into());
        self
    }
}

/// Result of a successful checkout.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    /// External payment page the customer should be sent to.
    pub redirect_url: Option<String>,
    /// False when an earlier checkout with the same idempotency key created
    /// the order.
    pub created: bool,
}

/// Order listing filter. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
    pub session_token: Option<String>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status == s)
            && self
                .user_id
                .as_ref()
                .map_or(true, |u| order.user_id.as_ref() == Some(u))
            && self
                .session_token
                .as_ref()
                .map_or(true, |t| order.session_token.as_ref() == Some(t))
    }
}

/// Outcome of one committed checkout attempt.
struct Committed {
    order: Order,
    stock: Vec<StockChange>,
    created: bool,
}

/// Order creation, status transitions and lookups.
#[derive(Clone)]
pub struct OrderService {
    db: Db,
    pricing: PricingConfig,
    retry: RetryPolicy,
    discounts: DiscountResolver,
    inventory: InventoryLedger,
    payments: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    invoices: Arc<dyn InvoiceGenerator>,
    membership: Arc<dyn MembershipTracker>,
}

impl OrderService {
    /// Service with offline payments, log notifications and plain-text
    /// invoices.
    pub fn new(db: Db, pricing: PricingConfig) -> Self {
        let retry = RetryPolicy::default();
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        Self {
            discounts: DiscountResolver::new(db.clone(), retry.clone()),
            inventory: InventoryLedger::new(db.clone(), retry.clone(), notifier.clone()),
            db,
            pricing,
            retry,
            payments: Arc::new(OfflinePaymentGateway),
            notifier,
            invoices: Arc::new(PlainTextInvoice),
            membership: Arc::new(NoopMembershipTracker),
        }
    }

    pub fn with_payment_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.payments = gateway;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self.rewire();
        self
    }

    pub fn with_invoice_generator(mut self, invoices: Arc<dyn InvoiceGenerator>) -> Self {
        self.invoices = invoices;
        self
    }

    pub fn with_membership_tracker(mut self, tracker: Arc<dyn MembershipTracker>) -> Self {
        self.membership = tracker;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self.rewire();
        self
    }

    fn rewire(&mut self) {
        self.discounts = DiscountResolver::new(self.db.clone(), self.retry.clone());
        self.inventory =
            InventoryLedger::new(self.db.clone(), self.retry.clone(), self.notifier.clone());
    }

    pub fn discounts(&self) -> &DiscountResolver {
        &self.discounts
    }

    pub fn inventory(&self) -> &InventoryLedger {
        &self.inventory
    }

    /// Price a cart without reserving stock or redeeming anything.
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn preview(
        &self,
        cart: &Cart,
        discount_code: Option<&str>,
    ) -> Result<PricingBreakdown, CommerceError> {
        if cart.is_empty() {
            return Err(CommerceError::EmptyCart);
        }
        let now = current_timestamp();
        let mut tx = self.db.begin();
        let (_, subtotal) = self.price_lines(&mut tx, cart).await?;
        let level = membership_level(&mut tx, cart.user_id.as_ref()).await?;
        let discounts = self
            .discounts
            .resolve_discount_in(
                &mut tx,
                discount_code,
                level,
                &subtotal,
                self.pricing.discount_policy,
                now,
            )
            .await?;
        PricingBreakdown::compute(subtotal, discounts, &self.pricing.shipping_policy())
    }

    /// Turn a cart into a pending order.
    ///
    /// Stock for every line is reserved, the discount code redeemed and the
    /// order inserted in one transaction. The payment gateway is called once,
    /// after that commit, for the committed total. A declined payment for a
    /// method that needs synchronous confirmation releases the reservation
    /// and fails the checkout; for cash on delivery and bank transfer the
    /// order stays with payment pending.
    #[instrument(skip(self, request), fields(cart_id = %request.cart.id, method = %request.payment_method))]
    pub async fn create_order(&self, request: CheckoutRequest) -> Result<PlacedOrder, CommerceError> {
        if request.cart.is_empty() {
            return Err(CommerceError::EmptyCart);
        }
        request.customer.validate()?;

        let order_id = OrderId::generate();
        let Committed {
            order,
            stock,
            created,
        } = self
            .retry
            .run("orders.create", || self.reserve(&request, &order_id))
            .await?;

        if !created {
            tracing::info!(order_id = %order.id, "Checkout replayed, returning existing order");
            return Ok(PlacedOrder {
                order,
                redirect_url: None,
                created: false,
            });
        }

        let result = match self.collect_payment(&order, request.return_url.clone()).await {
            Ok(result) => result,
            Err(e) => {
                self.release_reservation(&order).await;
                return Err(e);
            }
        };
        if !result.success && order.payment_method.requires_synchronous_confirmation() {
            self.release_reservation(&order).await;
            return Err(CommerceError::PaymentError(
                result
                    .message
                    .unwrap_or_else(|| "payment declined".to_string()),
            ));
        }
        let order = self.record_payment(order, &result).await?;

        tracing::info!(
            order_id = %order.id,
            total = %order.total,
            items = order.item_count(),
            discounts = order.applied_discounts.len(),
            "Order placed"
        );
        if let Err(e) = self.notifier.send_order_confirmation(&order).await {
            tracing::warn!(order_id = %order.id, error = %e, "Failed to send order confirmation");
        }
        self.inventory.notify_low_stock(&stock).await;

        Ok(PlacedOrder {
            redirect_url: result.redirect_url,
            order,
            created: true,
        })
    }

    /// Reserve stock, redeem codes and insert the pending order.
    async fn reserve(
        &self,
        request: &CheckoutRequest,
        order_id: &OrderId,
    ) -> Result<Committed, CommerceError> {
        let now = current_timestamp();
        let mut tx = self.db.begin();

        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = repository::order_for_key(&mut tx, key).await? {
                let order = repository::order(&mut tx, &existing).await?;
                return Ok(Committed {
                    order,
                    stock: Vec::new(),
                    created: false,
                });
            }
        }

        let cart = &request.cart;
        let (line_items, subtotal) = self.price_lines(&mut tx, cart).await?;
        let level = membership_level(&mut tx, cart.user_id.as_ref()).await?;
        let discounts = self
            .discounts
            .resolve_discount_in(
                &mut tx,
                request.discount_code.as_deref(),
                level,
                &subtotal,
                self.pricing.discount_policy,
                now,
            )
            .await?;
        let pricing =
            PricingBreakdown::compute(subtotal, discounts, &self.pricing.shipping_policy())?;

        let draft = OrderDraft {
            user_id: cart.user_id.clone(),
            session_token: Some(cart.session_token.clone()),
            customer: request.customer.clone(),
            payment_method: request.payment_method,
            idempotency_key: request.idempotency_key.clone(),
        };
        let order = Order::new(order_id.clone(), draft, line_items, pricing, now)?;

        let mut stock = Vec::with_capacity(order.line_items.len());
        for item in &order.line_items {
            let change = self
                .inventory
                .deduct_in(&mut tx, &item.product_id, item.quantity, Some(&order.id), now)
                .await?;
            stock.push(change);
        }

        for applied in &order.applied_discounts {
            if let Some(code) = applied.source.code() {
                self.discounts
                    .redeem_in(&mut tx, code, &order.id, applied.amount, now)
                    .await?;
            }
        }

        repository::put_order(&mut tx, &order)?;
        tx.commit().await?;
        Ok(Committed {
            order,
            stock,
            created: true,
        })
    }

    async fn collect_payment(
        &self,
        order: &Order,
        return_url: Option<String>,
    ) -> Result<PaymentResult, CommerceError> {
        let request = PaymentRequest {
            order_id: order.id.clone(),
            method: order.payment_method,
            amount: order.total,
            return_url,
        };
        match self.payments.process_payment(&request).await {
            Ok(result) => Ok(result),
            Err(e) if !order.payment_method.requires_synchronous_confirmation() => {
                tracing::warn!(order_id = %order.id, error = %e, "Payment gateway failed");
                Ok(PaymentResult::declined(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Store the gateway outcome on a reserved order.
    async fn record_payment(
        &self,
        order: Order,
        result: &PaymentResult,
    ) -> Result<Order, CommerceError> {
        if !result.success {
            tracing::warn!(
                order_id = %order.id,
                method = %order.payment_method,
                message = result.message.as_deref().unwrap_or(""),
                "Payment not confirmed, order stays unpaid"
            );
            return Ok(order);
        }
        if result.transaction_id.is_none() && !order.payment_method.requires_synchronous_confirmation()
        {
            return Ok(order);
        }

        let order_id = &order.id;
        let recorded = self
            .retry
            .run("orders.record_payment", || async move {
                let now = current_timestamp();
                let mut tx = self.db.begin();
                let mut order = repository::order(&mut tx, order_id).await?;
                if order.payment_method.requires_synchronous_confirmation() {
                    order.mark_paid(result.transaction_id.clone(), now)?;
                } else {
                    order.transaction_id = result.transaction_id.clone();
                    order.updated_at = now;
                }
                repository::put_order(&mut tx, &order)?;
                tx.commit().await?;
                Ok(order)
            })
            .await;

        recorded.map_err(|e| {
            tracing::error!(
                order_id = %order.id,
                error = %e,
                "Payment was collected but could not be recorded on the order"
            );
            e
        })
    }

    /// Undo a reservation whose payment failed.
    async fn release_reservation(&self, order: &Order) {
        let order_id = &order.id;
        let released = self
            .retry
            .run("orders.release", || async move {
                let now = current_timestamp();
                let mut tx = self.db.begin();
                let order = repository::order(&mut tx, order_id).await?;
                order.ensure_deletable()?;
                self.release_order_in(&mut tx, &order, now).await?;
                tx.commit().await?;
                Ok(())
            })
            .await;

        match released {
            Ok(()) => tracing::info!(order_id = %order_id, "Reservation released after failed payment"),
            Err(e) => tracing::error!(
                order_id = %order_id,
                error = %e,
                "Failed to release reservation after failed payment"
            ),
        }
    }

    /// Return reserved stock, release redeemed codes and delete the order.
    async fn release_order_in(
        &self,
        tx: &mut Transaction,
        order: &Order,
        now: i64,
    ) -> Result<(), CommerceError> {
        for item in &order.line_items {
            self.inventory
                .return_stock_in(tx, &item.product_id, item.quantity, &order.id, now)
                .await?;
        }
        for code in order.discount_codes() {
            self.discounts.release_in(tx, code, &order.id, now).await?;
        }
        repository::delete_order(tx, order);
        Ok(())
    }

    /// Snapshot current product names and prices into order lines.
    async fn price_lines(
        &self,
        tx: &mut Transaction,
        cart: &Cart,
    ) -> Result<(Vec<OrderLineItem>, Money), CommerceError> {
        let mut lines = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            let product = repository::product(tx, &item.product_id).await?;
            if !product.is_purchasable() {
                return Err(CommerceError::ValidationError(format!(
                    "{} is not available for purchase",
                    product.name
                )));
            }
            if product.price.currency != self.pricing.currency {
                return Err(CommerceError::CurrencyMismatch {
                    expected: self.pricing.currency.code().to_string(),
                    got: product.price.currency.code().to_string(),
                });
            }
            lines.push(OrderLineItem::snapshot(&product, item.quantity)?);
        }
        let subtotal = Money::try_sum(lines.iter().map(|l| &l.line_total), self.pricing.currency)
            .ok_or(CommerceError::Overflow)?;
        Ok((lines, subtotal))
    }

    /// Move an order to `next`.
    ///
    /// Cancelling or refunding puts every line's quantity back into stock in
    /// the same transaction. Illegal transitions fail with
    /// [`CommerceError::InvalidStatusTransition`] and change nothing.
    #[instrument(skip(self), fields(order_id = %order_id, to = %next))]
    pub async fn update_status(
        &self,
        order_id: &OrderId,
        next: OrderStatus,
    ) -> Result<Order, CommerceError> {
        let (order, change) = self
            .retry
            .run("orders.update_status", || async move {
                let now = current_timestamp();
                let mut tx = self.db.begin();
                let mut order = repository::order(&mut tx, order_id).await?;
                let change = order.transition_to(next, now)?;

                if change.returns_stock() {
                    for item in &order.line_items {
                        self.inventory
                            .return_stock_in(&mut tx, &item.product_id, item.quantity, &order.id, now)
                            .await?;
                    }
                }

                repository::put_order(&mut tx, &order)?;
                tx.commit().await?;
                Ok((order, change))
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            from = %change.from,
            to = %change.to,
            payment = %change.payment_after,
            "Order status changed"
        );
        self.after_status_change(&order, &change).await;
        Ok(order)
    }

    async fn after_status_change(&self, order: &Order, change: &StatusChange) {
        if let Err(e) = self.notifier.send_order_status_update(order, change).await {
            tracing::warn!(order_id = %order.id, error = %e, "Failed to send status update");
        }

        if change.to == OrderStatus::Delivered {
            if let Some(user_id) = &order.user_id {
                if let Err(e) = self
                    .membership
                    .record_completed_order(user_id, &order.total)
                    .await
                {
                    tracing::warn!(
                        order_id = %order.id,
                        user_id = %user_id,
                        error = %e,
                        "Failed to record purchase for membership"
                    );
                }
            }
        }
    }

    /// Delete a pending order outright.
    ///
    /// Reserved stock is returned and redeemed discount codes are released.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: &OrderId) -> Result<(), CommerceError> {
        self.retry
            .run("orders.delete", || async move {
                let now = current_timestamp();
                let mut tx = self.db.begin();
                let order = repository::order(&mut tx, order_id).await?;
                order.ensure_deletable()?;
                self.release_order_in(&mut tx, &order, now).await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;

        tracing::info!(order_id = %order_id, "Order deleted");
        Ok(())
    }

    /// Record a manually confirmed payment, e.g. a received bank transfer.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_paid(
        &self,
        order_id: &OrderId,
        transaction_id: Option<String>,
    ) -> Result<Order, CommerceError> {
        let transaction_id = &transaction_id;
        let order = self
            .retry
            .run("orders.mark_paid", || async move {
                let mut tx = self.db.begin();
                let mut order = repository::order(&mut tx, order_id).await?;
                order.mark_paid(transaction_id.clone(), current_timestamp())?;
                repository::put_order(&mut tx, &order)?;
                tx.commit().await?;
                Ok(order)
            })
            .await?;

        tracing::info!(order_id = %order.id, "Payment confirmed");
        Ok(order)
    }

    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order, CommerceError> {
        self.db
            .get(tables::ORDERS, order_id.as_str())
            .await?
            .ok_or_else(|| CommerceError::OrderNotFound(order_id.to_string()))
    }

    /// Orders matching `filter`, newest first.
    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, CommerceError> {
        let orders: Vec<Order> = self.db.scan(tables::ORDERS).await?;
        let mut orders: Vec<Order> = orders.into_iter().filter(|o| filter.matches(o)).collect();
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_str().cmp(a.id.as_str()))
        });
        Ok(orders)
    }

    /// Render an invoice. Read-only.
    pub async fn invoice(&self, order_id: &OrderId) -> Result<Vec<u8>, CommerceError> {
        let order = self.get_order(order_id).await?;
        self.invoices.generate_invoice(&order).await
    }
}

/// Membership level used for discounts. Guests have none.
async fn membership_level(
    tx: &mut Transaction,
    user_id: Option<&UserId>,
) -> Result<Option<MembershipLevel>, CommerceError> {
    let Some(user_id) = user_id else {
        return Ok(None);
    };
    let level = repository::customer(tx, user_id)
        .await?
        .map(|c| c.level)
        .unwrap_or(MembershipLevel::Regular);
    Ok(Some(level))
}
