mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use storefront_orders::prelude::*;
use tokio_util::sync::CancellationToken;

fn save10() -> Discount {
    let terms = DiscountTerms::new(DiscountValue::Percentage(10.0), current_timestamp() - 60)
        .with_maximum_discount(vnd(40_000));
    Discount::new("SAVE10", "10% off", terms)
}

#[tokio::test]
async fn test_save10_capped_discount_scenario() {
    let store = Store::new();
    let shirt = store.add_product("prod-shirt", "Shirt", 250_000, 20).await;
    store.orders.discounts().create_discount(save10()).await.unwrap();

    let cart = store.cart(&[(&shirt, 2, 250_000)]);
    let placed = store
        .orders
        .create_order(
            CheckoutRequest::new(cart, customer(), PaymentMethod::CashOnDelivery)
                .with_discount_code("SAVE10"),
        )
        .await
        .unwrap();

    let order = placed.order;
    assert_eq!(order.subtotal, vnd(500_000));
    assert_eq!(order.discount_amount, vnd(40_000));
    assert_eq!(order.shipping_fee, vnd(30_000));
    assert_eq!(order.total, vnd(490_000));
    assert_eq!(order.discount_codes().collect::<Vec<_>>(), vec!["SAVE10"]);

    let discount = store.orders.discounts().get_discount("SAVE10").await.unwrap();
    assert_eq!(discount.terms.usage_count, 1);
}

#[tokio::test]
async fn test_insufficient_inventory_places_nothing() {
    let store = Store::new();
    let lamp = store.add_product("prod-lamp", "Desk Lamp", 400_000, 1).await;

    let err = store
        .orders
        .create_order(CheckoutRequest::new(
            store.cart(&[(&lamp, 2, 400_000)]),
            customer(),
            PaymentMethod::CashOnDelivery,
        ))
        .await
        .unwrap_err();

    match err {
        CommerceError::InsufficientInventory {
            product_id,
            product_name,
            requested,
            available,
        } => {
            assert_eq!(product_id, "prod-lamp");
            assert_eq!(product_name, "Desk Lamp");
            assert_eq!((requested, available), (2, 1));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.stock(&lamp).await, 1);
    assert!(store
        .orders
        .list_orders(&OrderFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_failed_checkout_does_not_redeem_discount() {
    let store = Store::new();
    let lamp = store.add_product("prod-lamp", "Desk Lamp", 400_000, 1).await;
    store.orders.discounts().create_discount(save10()).await.unwrap();

    let result = store
        .orders
        .create_order(
            CheckoutRequest::new(
                store.cart(&[(&lamp, 2, 400_000)]),
                customer(),
                PaymentMethod::CashOnDelivery,
            )
            .with_discount_code("SAVE10"),
        )
        .await;
    assert!(result.is_err());

    let discount = store.orders.discounts().get_discount("SAVE10").await.unwrap();
    assert_eq!(discount.terms.usage_count, 0);
}

#[tokio::test]
async fn test_cancel_processing_order_restores_stock() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 10).await;
    let order = store
        .place(store.cart(&[(&mug, 3, 100_000)]), PaymentMethod::BankTransfer)
        .await;
    assert_eq!(store.stock(&mug).await, 7);

    store
        .orders
        .update_status(&order.id, OrderStatus::Processing)
        .await
        .unwrap();
    let cancelled = store
        .orders
        .update_status(&order.id, OrderStatus::Cancelled)
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Failed);
    assert_eq!(store.stock(&mug).await, 10);

    let adjustments = store.orders.inventory().adjustments(&mug).await.unwrap();
    let returned = adjustments
        .iter()
        .find(|a| a.reason == AdjustmentReason::Return)
        .unwrap();
    assert_eq!(returned.quantity_change, 3);
    assert_eq!(returned.order_id.as_ref(), Some(&order.id));
}

#[tokio::test]
async fn test_illegal_transitions_rejected_without_side_effects() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 10).await;
    let order = store
        .place(store.cart(&[(&mug, 1, 100_000)]), PaymentMethod::CashOnDelivery)
        .await;

    for next in [OrderStatus::Shipped, OrderStatus::Delivered, OrderStatus::Refunded, OrderStatus::Pending] {
        let err = store.orders.update_status(&order.id, next).await.unwrap_err();
        assert!(matches!(
            err,
            CommerceError::InvalidStatusTransition {
                from: OrderStatus::Pending,
                ..
            }
        ));
    }
    assert_eq!(store.stock(&mug).await, 9);

    store
        .orders
        .update_status(&order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    let err = store
        .orders
        .update_status(&order.id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::InvalidStatusTransition { .. }));
    assert_eq!(store.stock(&mug).await, 10);
}

#[tokio::test]
async fn test_unknown_order() {
    let store = Store::new();
    let err = store
        .orders
        .update_status(&OrderId::new("ord-missing"), OrderStatus::Processing)
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::OrderNotFound(_)));
}

#[tokio::test]
async fn test_idempotent_checkout_counts_discount_once() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 10).await;
    store.orders.discounts().create_discount(save10()).await.unwrap();

    let request = CheckoutRequest::new(
        store.cart(&[(&mug, 2, 100_000)]),
        customer(),
        PaymentMethod::CashOnDelivery,
    )
    .with_discount_code("SAVE10")
    .with_idempotency_key("client-req-42");

    let first = store.orders.create_order(request.clone()).await.unwrap();
    let replay = store.orders.create_order(request).await.unwrap();

    assert!(first.created);
    assert!(!replay.created);
    assert_eq!(first.order.id, replay.order.id);
    assert_eq!(store.stock(&mug).await, 8);
    let discount = store.orders.discounts().get_discount("SAVE10").await.unwrap();
    assert_eq!(discount.terms.usage_count, 1);
}

#[tokio::test]
async fn test_deleting_pending_order_releases_everything() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 10).await;
    store.orders.discounts().create_discount(save10()).await.unwrap();

    let order = store
        .orders
        .create_order(
            CheckoutRequest::new(
                store.cart(&[(&mug, 4, 100_000)]),
                customer(),
                PaymentMethod::CashOnDelivery,
            )
            .with_discount_code("SAVE10"),
        )
        .await
        .unwrap()
        .order;

    store.orders.delete_order(&order.id).await.unwrap();
    assert_eq!(store.stock(&mug).await, 10);
    let discount = store.orders.discounts().get_discount("SAVE10").await.unwrap();
    assert_eq!(discount.terms.usage_count, 0);
}

#[tokio::test]
async fn test_notifications_after_commit() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 12).await;
    let order = store
        .place(store.cart(&[(&mug, 3, 100_000)]), PaymentMethod::CashOnDelivery)
        .await;
    store
        .orders
        .update_status(&order.id, OrderStatus::Processing)
        .await
        .unwrap();

    let sent = store.notifier.sent();
    assert!(sent.contains(&Sent::Confirmation(order.id.clone())));
    assert!(sent.contains(&Sent::LowStock(mug.clone(), 9)));
    assert!(sent.contains(&Sent::StatusUpdate(order.id.clone(), OrderStatus::Processing)));

    // Already low: a further deduction does not notify again.
    store
        .place(store.cart(&[(&mug, 1, 100_000)]), PaymentMethod::CashOnDelivery)
        .await;
    let low_stock = store
        .notifier
        .sent()
        .into_iter()
        .filter(|s| matches!(s, Sent::LowStock(..)))
        .count();
    assert_eq!(low_stock, 1);
}

#[tokio::test]
async fn test_notification_failures_never_fail_orders() {
    let store = Store::with_notifier(Arc::new(RecordingNotifier::failing()));
    let mug = store.add_product("prod-mug", "Mug", 100_000, 10).await;
    let order = store
        .place(store.cart(&[(&mug, 1, 100_000)]), PaymentMethod::CashOnDelivery)
        .await;
    store
        .orders
        .update_status(&order.id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(store.notifier.sent().len(), 2);
}

#[tokio::test]
async fn test_prepaid_card_marks_order_paid() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 10).await;
    let gateway = Arc::new(ScriptedGateway::approving());
    let orders = store.orders.clone().with_payment_gateway(gateway.clone());

    let order = orders
        .create_order(CheckoutRequest::new(
            store.cart(&[(&mug, 1, 100_000)]),
            customer(),
            PaymentMethod::Card,
        ))
        .await
        .unwrap()
        .order;

    assert_eq!(gateway.call_count(), 1);
    assert_eq!(order.payment_status, PaymentStatus::Completed);
    assert_eq!(order.transaction_id, Some(format!("tx-{}", order.id)));
}

#[tokio::test]
async fn test_declined_card_rolls_back_but_cod_does_not() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 10).await;
    let gateway = Arc::new(ScriptedGateway::declining());
    let orders = store.orders.clone().with_payment_gateway(gateway.clone());

    let err = orders
        .create_order(CheckoutRequest::new(
            store.cart(&[(&mug, 1, 100_000)]),
            customer(),
            PaymentMethod::EWallet,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::PaymentError(_)));
    assert_eq!(store.stock(&mug).await, 10);

    let cod = orders
        .create_order(CheckoutRequest::new(
            store.cart(&[(&mug, 1, 100_000)]),
            customer(),
            PaymentMethod::CashOnDelivery,
        ))
        .await
        .unwrap()
        .order;
    assert_eq!(cod.payment_status, PaymentStatus::Pending);
    assert_eq!(store.stock(&mug).await, 9);
    assert_eq!(gateway.call_count(), 2);
}

/// Approves the payment after another checkout has emptied the shelf.
struct ShelfEmptyingGateway {
    inventory: InventoryLedger,
    product: ProductId,
    charges: std::sync::Mutex<Vec<Money>>,
}

#[async_trait::async_trait]
impl PaymentGateway for ShelfEmptyingGateway {
    async fn process_payment(
        &self,
        request: &storefront_orders::PaymentRequest,
    ) -> Result<storefront_orders::PaymentResult, CommerceError> {
        self.inventory.set_quantity(&self.product, 0).await?;
        self.charges.lock().unwrap().push(request.amount);
        Ok(storefront_orders::PaymentResult::approved(Some(
            "tx-shelf".to_string(),
        )))
    }
}

#[tokio::test]
async fn test_charged_order_survives_stock_change_during_payment() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 5).await;
    let gateway = Arc::new(ShelfEmptyingGateway {
        inventory: store.orders.inventory().clone(),
        product: mug.clone(),
        charges: std::sync::Mutex::new(Vec::new()),
    });
    let orders = store.orders.clone().with_payment_gateway(gateway.clone());

    let order = orders
        .create_order(CheckoutRequest::new(
            store.cart(&[(&mug, 1, 100_000)]),
            customer(),
            PaymentMethod::Card,
        ))
        .await
        .unwrap()
        .order;

    let charges = gateway.charges.lock().unwrap().clone();
    assert_eq!(charges, vec![order.total]);
    let stored = orders.get_order(&order.id).await.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Completed);
    assert_eq!(stored.transaction_id.as_deref(), Some("tx-shelf"));
    assert_eq!(store.stock(&mug).await, 0);
}

#[tokio::test]
async fn test_declined_card_releases_reservation() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 250_000, 10).await;
    store.orders.discounts().create_discount(save10()).await.unwrap();
    let gateway = Arc::new(ScriptedGateway::declining());
    let orders = store.orders.clone().with_payment_gateway(gateway.clone());

    let err = orders
        .create_order(
            CheckoutRequest::new(
                store.cart(&[(&mug, 2, 250_000)]),
                customer(),
                PaymentMethod::Card,
            )
            .with_discount_code("SAVE10")
            .with_idempotency_key("checkout-card"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::PaymentError(_)));

    let charged = gateway.calls.lock().unwrap().clone();
    assert_eq!(charged.len(), 1);
    assert_eq!(charged[0].amount, vnd(490_000));

    assert_eq!(store.stock(&mug).await, 10);
    let discount = store.orders.discounts().get_discount("SAVE10").await.unwrap();
    assert_eq!(discount.terms.usage_count, 0);
    assert!(orders
        .list_orders(&OrderFilter::default())
        .await
        .unwrap()
        .is_empty());

    // The key is free again, so a retry with a working card goes through.
    let retried = store
        .orders
        .clone()
        .with_payment_gateway(Arc::new(ScriptedGateway::approving()))
        .create_order(
            CheckoutRequest::new(
                store.cart(&[(&mug, 2, 250_000)]),
                customer(),
                PaymentMethod::Card,
            )
            .with_discount_code("SAVE10")
            .with_idempotency_key("checkout-card"),
        )
        .await
        .unwrap();
    assert!(retried.created);
    assert_eq!(retried.order.payment_status, PaymentStatus::Completed);
}

#[tokio::test]
async fn test_delivery_feeds_membership_tracker() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 10).await;
    let tracker = Arc::new(RecordingTracker::default());
    let orders = store.orders.clone().with_membership_tracker(tracker.clone());

    let mut cart = Cart::for_user(UserId::new("user-7"), "sess-7", Currency::VND);
    cart.add_item(mug.clone(), "Mug", 2, vnd(100_000)).unwrap();
    let order = orders
        .create_order(CheckoutRequest::new(cart, customer(), PaymentMethod::CashOnDelivery))
        .await
        .unwrap()
        .order;

    for next in [OrderStatus::Processing, OrderStatus::Shipped] {
        orders.update_status(&order.id, next).await.unwrap();
    }
    assert!(tracker.calls.lock().unwrap().is_empty());

    orders
        .update_status(&order.id, OrderStatus::Delivered)
        .await
        .unwrap();
    let calls = tracker.calls.lock().unwrap().clone();
    assert_eq!(calls, vec![(UserId::new("user-7"), order.total)]);
}

#[tokio::test]
async fn test_membership_discount_applies_to_members() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 10).await;
    let thresholds = MembershipConfig::default().thresholds(Currency::VND).unwrap();
    let tracker = StoreMembershipTracker::new(store.db.clone(), thresholds, RetryPolicy::default());
    let user = UserId::new("user-gold");
    tracker
        .record_completed_order(&user, &vnd(25_000_000))
        .await
        .unwrap();

    let terms = DiscountTerms::new(DiscountValue::Percentage(20.0), current_timestamp() - 60);
    store
        .orders
        .discounts()
        .create_membership_discount(MembershipDiscount::new(MembershipLevel::Gold, "Gold 20%", terms))
        .await
        .unwrap();

    let mut member_cart = Cart::for_user(user, "sess-g", Currency::VND);
    member_cart.add_item(mug.clone(), "Mug", 1, vnd(100_000)).unwrap();
    let member = store.orders.preview(&member_cart, None).await.unwrap();
    assert_eq!(member.discount_total, vnd(20_000));

    let guest = store
        .orders
        .preview(&store.cart(&[(&mug, 1, 100_000)]), None)
        .await
        .unwrap();
    assert_eq!(guest.discount_total, vnd(0));
}

#[tokio::test]
async fn test_sweep_disabled_transitions_nothing() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 10).await;
    let order = store
        .place(store.cart(&[(&mug, 1, 100_000)]), PaymentMethod::BankTransfer)
        .await;

    let sweep = AutoConfirmSweep::new(
        store.orders.clone(),
        store.settings.clone(),
        Duration::from_secs(60),
        CancellationToken::new(),
    );
    let report = sweep.sweep_at(current_timestamp() + 30 * 86_400).await.unwrap();
    assert_eq!(report.confirmed, 0);
    assert_eq!(
        store.orders.get_order(&order.id).await.unwrap().status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn test_sweep_skips_high_value_and_survives_failures() {
    let store = Store::new();
    let tv = store.add_product("prod-tv", "Television", 12_000_000, 5).await;
    let mug = store.add_product("prod-mug", "Mug", 100_000, 10).await;
    let big = store
        .place(store.cart(&[(&tv, 1, 12_000_000)]), PaymentMethod::BankTransfer)
        .await;
    let small = store
        .place(store.cart(&[(&mug, 1, 100_000)]), PaymentMethod::BankTransfer)
        .await;

    let mut settings = store.settings.load().await.unwrap();
    settings.auto_confirm_enabled = true;
    settings.confirmation_delay_minutes = 0;
    settings.exclude_high_value = true;
    settings.high_value_threshold = vnd(10_000_000);
    store.settings.update(settings).await.unwrap();

    let sweep = AutoConfirmSweep::new(
        store.orders.clone(),
        store.settings.clone(),
        Duration::from_secs(60),
        CancellationToken::new(),
    );
    let report = sweep.sweep_at(current_timestamp()).await.unwrap();
    assert_eq!(report.skipped_high_value, 1);
    assert_eq!(report.confirmed, 1);
    assert_eq!(
        store.orders.get_order(&small.id).await.unwrap().status,
        OrderStatus::Processing
    );
    assert_eq!(
        store.orders.get_order(&big.id).await.unwrap().status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn test_cancelled_sweep_stops_between_orders() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 10).await;
    for _ in 0..3 {
        store
            .place(store.cart(&[(&mug, 1, 100_000)]), PaymentMethod::BankTransfer)
            .await;
    }
    let mut settings = store.settings.load().await.unwrap();
    settings.auto_confirm_enabled = true;
    settings.confirmation_delay_minutes = 0;
    store.settings.update(settings).await.unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let sweep = AutoConfirmSweep::new(
        store.orders.clone(),
        store.settings.clone(),
        Duration::from_secs(60),
        token,
    );
    let report = sweep.sweep_at(current_timestamp()).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.selected, 3);
    assert_eq!(report.confirmed, 0);
}

#[tokio::test]
async fn test_orders_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    let order_id = {
        let db = Db::open(&path).await.unwrap();
        let catalog = CatalogService::new(db.clone(), RetryPolicy::default());
        let mug = catalog
            .add_product(Product::new("MUG", "Mug", vnd(100_000), 5).unwrap())
            .await
            .unwrap();
        let orders = OrderService::new(db, PricingConfig::default());
        let mut cart = Cart::new("sess-1", Currency::VND);
        cart.add_item(mug.id.clone(), "Mug", 2, vnd(100_000)).unwrap();
        orders
            .create_order(CheckoutRequest::new(cart, customer(), PaymentMethod::CashOnDelivery))
            .await
            .unwrap()
            .order
            .id
    };

    let reopened = OrderService::new(Db::open(&path).await.unwrap(), PricingConfig::default());
    let order = reopened.get_order(&order_id).await.unwrap();
    assert_eq!(order.item_count(), 2);
    assert_eq!(
        reopened
            .inventory()
            .get(&order.line_items[0].product_id)
            .await
            .unwrap()
            .quantity,
        3
    );
}
