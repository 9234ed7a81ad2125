//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use storefront_orders::prelude::*;
use storefront_orders::{NotificationError, PaymentRequest, PaymentResult};

pub fn vnd(amount: i64) -> Money {
    Money::new(amount, Currency::VND)
}

pub fn customer() -> CustomerInfo {
    CustomerInfo::new("An Nguyen", "an@example.com", "0901234567", "1 Le Loi, HCMC")
}

/// Notification calls seen by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Confirmation(OrderId),
    StatusUpdate(OrderId, OrderStatus),
    LowStock(ProductId, i64),
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Sent>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, entry: Sent) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(entry);
        if self.fail {
            return Err(NotificationError("smtp unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_order_confirmation(&self, order: &Order) -> Result<(), NotificationError> {
        self.record(Sent::Confirmation(order.id.clone()))
    }

    async fn send_order_status_update(
        &self,
        order: &Order,
        change: &StatusChange,
    ) -> Result<(), NotificationError> {
        self.record(Sent::StatusUpdate(order.id.clone(), change.to))
    }

    async fn send_low_stock_notification(
        &self,
        product: &Product,
        inventory: &Inventory,
    ) -> Result<(), NotificationError> {
        self.record(Sent::LowStock(product.id.clone(), inventory.quantity))
    }
}

/// Gateway that approves or declines everything and counts calls.
pub struct ScriptedGateway {
    pub approve: bool,
    pub calls: Mutex<Vec<PaymentRequest>>,
}

impl ScriptedGateway {
    pub fn approving() -> Self {
        Self {
            approve: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn declining() -> Self {
        Self {
            approve: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn process_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentResult, CommerceError> {
        self.calls.lock().unwrap().push(request.clone());
        if self.approve {
            Ok(PaymentResult::approved(Some(format!("tx-{}", request.order_id))))
        } else {
            Ok(PaymentResult::declined("card declined"))
        }
    }
}

#[derive(Default)]
pub struct RecordingTracker {
    pub calls: Mutex<Vec<(UserId, Money)>>,
}

#[async_trait]
impl MembershipTracker for RecordingTracker {
    async fn record_completed_order(
        &self,
        user_id: &UserId,
        order_amount: &Money,
    ) -> Result<(), CommerceError> {
        self.calls
            .lock()
            .unwrap()
            .push((user_id.clone(), *order_amount));
        Ok(())
    }
}

/// A store with a catalog, wired services and recording collaborators.
pub struct Store {
    pub db: Db,
    pub catalog: CatalogService,
    pub orders: OrderService,
    pub settings: SettingsStore,
    pub notifier: Arc<RecordingNotifier>,
}

impl Store {
    pub fn new() -> Self {
        Self::with_notifier(Arc::new(RecordingNotifier::default()))
    }

    pub fn with_notifier(notifier: Arc<RecordingNotifier>) -> Self {
        let db = Db::open_in_memory();
        let orders = OrderService::new(db.clone(), PricingConfig::default())
            .with_notifier(notifier.clone());
        Self {
            catalog: CatalogService::new(db.clone(), RetryPolicy::default()),
            settings: SettingsStore::new(db.clone(), Currency::VND),
            orders,
            notifier,
            db,
        }
    }

    pub async fn add_product(&self, id: &str, name: &str, price: i64, stock: i64) -> ProductId {
        let product = Product::new(id.to_uppercase(), name, vnd(price), stock)
            .unwrap()
            .with_id(id);
        self.catalog.add_product(product).await.unwrap().id
    }

    pub async fn stock(&self, id: &ProductId) -> i64 {
        self.orders.inventory().get(id).await.unwrap().quantity
    }

    pub fn cart(&self, lines: &[(&ProductId, i64, i64)]) -> Cart {
        let mut cart = Cart::new("sess-1", Currency::VND);
        for (product_id, quantity, price) in lines {
            cart.add_item((*product_id).clone(), "item", *quantity, vnd(*price))
                .unwrap();
        }
        cart
    }

    pub async fn place(&self, cart: Cart, method: PaymentMethod) -> Order {
        self.orders
            .create_order(CheckoutRequest::new(cart, customer(), method))
            .await
            .unwrap()
            .order
    }
}
