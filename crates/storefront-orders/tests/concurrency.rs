mod common;

use common::*;
use storefront_orders::prelude::*;
use storefront_orders::BackoffStrategy;
use std::time::Duration;

fn contended_retry() -> RetryPolicy {
    RetryPolicy::new(500).with_backoff(BackoffStrategy::Exponential {
        base: Duration::from_millis(1),
        max: Duration::from_millis(10),
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_never_oversell() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 10).await;
    let orders = store.orders.clone().with_retry(contended_retry());

    let mut handles = Vec::new();
    for i in 0..25 {
        let orders = orders.clone();
        let mut cart = Cart::new(format!("sess-{i}"), Currency::VND);
        cart.add_item(mug.clone(), "Mug", 1, vnd(100_000)).unwrap();
        handles.push(tokio::spawn(async move {
            orders
                .create_order(CheckoutRequest::new(cart, customer(), PaymentMethod::CashOnDelivery))
                .await
        }));
    }

    let mut placed = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(CommerceError::InsufficientInventory { .. }) => out_of_stock += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(placed, 10);
    assert_eq!(out_of_stock, 15);
    assert_eq!(store.stock(&mug).await, 0);
    let product = store.catalog.get_product(&mug).await.unwrap();
    assert_eq!(product.stock, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deduct_and_restock_balance_out() {
    let store = Store::new();
    let mug = store.add_product("prod-mug", "Mug", 100_000, 100).await;
    let ledger = InventoryLedger::new(
        store.db.clone(),
        contended_retry(),
        std::sync::Arc::new(storefront_orders::LogNotifier),
    );

    let mut handles = Vec::new();
    for i in 0..40 {
        let ledger = ledger.clone();
        let mug = mug.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                ledger.deduct(&mug, 3).await.map(|_| ())
            } else {
                ledger.restock(&mug, 3).await.map(|_| ())
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.stock(&mug).await, 100);
}
