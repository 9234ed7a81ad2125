//! Typed access to the store's tables.
//!
//! Every helper works inside a caller-owned [`Transaction`], so a service can
//! group reads and writes across tables into one atomic commit. Ownership
//! rules (line items live inside their order, one inventory row per product)
//! are enforced here and in the services, not by the store.

use serde::{Deserialize, Serialize};
use storefront_commerce::cart::{Discount, MembershipDiscount};
use storefront_commerce::catalog::{Inventory, InventoryAdjustment, Product};
use storefront_commerce::checkout::{Order, OrderConfirmationSettings};
use storefront_commerce::membership::Customer;
use storefront_commerce::{
    AdjustmentId, CommerceError, DiscountId, Money, OrderId, ProductId, UserId,
};
use storefront_db::Transaction;

/// Table names.
pub mod tables {
    pub const PRODUCTS: &str = "products";
    pub const INVENTORY: &str = "inventory";
    pub const INVENTORY_ADJUSTMENTS: &str = "inventory_adjustments";
    pub const ORDERS: &str = "orders";
    /// Idempotency key -> order id.
    pub const ORDER_KEYS: &str = "order_keys";
    /// Code discounts, keyed by code.
    pub const DISCOUNTS: &str = "discounts";
    pub const MEMBERSHIP_DISCOUNTS: &str = "membership_discounts";
    /// One row per (code, order).
    pub const DISCOUNT_REDEMPTIONS: &str = "discount_redemptions";
    pub const CUSTOMERS: &str = "customers";
    pub const SETTINGS: &str = "settings";
}

/// Key of the auto-confirmation settings row.
pub const CONFIRMATION_SETTINGS_KEY: &str = "order_confirmation";

/// Proof that an order redeemed a discount code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountRedemption {
    pub code: String,
    pub discount_id: DiscountId,
    pub order_id: OrderId,
    pub amount: Money,
    pub redeemed_at: i64,
}

impl DiscountRedemption {
    pub fn key(code: &str, order_id: &OrderId) -> String {
        format!("{code}:{order_id}")
    }
}

// Catalog

pub async fn product(tx: &mut Transaction, id: &ProductId) -> Result<Product, CommerceError> {
    tx.get(tables::PRODUCTS, id.as_str())
        .await?
        .ok_or_else(|| CommerceError::ProductNotFound(id.to_string()))
}

pub fn put_product(tx: &mut Transaction, product: &Product) -> Result<(), CommerceError> {
    Ok(tx.put(tables::PRODUCTS, product.id.as_str(), product)?)
}

pub async fn inventory(
    tx: &mut Transaction,
    id: &ProductId,
) -> Result<Option<Inventory>, CommerceError> {
    Ok(tx.get(tables::INVENTORY, id.as_str()).await?)
}

pub fn put_inventory(tx: &mut Transaction, inventory: &Inventory) -> Result<(), CommerceError> {
    Ok(tx.put(tables::INVENTORY, inventory.product_id.as_str(), inventory)?)
}

/// Append an audit row. Adjustment rows are never read inside a transaction.
pub fn record_adjustment(
    tx: &mut Transaction,
    adjustment: &InventoryAdjustment,
) -> Result<(), CommerceError> {
    let key = AdjustmentId::generate();
    Ok(tx.put(tables::INVENTORY_ADJUSTMENTS, key.as_str(), adjustment)?)
}

// Orders

pub async fn order(tx: &mut Transaction, id: &OrderId) -> Result<Order, CommerceError> {
    tx.get(tables::ORDERS, id.as_str())
        .await?
        .ok_or_else(|| CommerceError::OrderNotFound(id.to_string()))
}

pub fn put_order(tx: &mut Transaction, order: &Order) -> Result<(), CommerceError> {
    order.verify_totals()?;
    tx.put(tables::ORDERS, order.id.as_str(), order)?;
    if let Some(key) = &order.idempotency_key {
        tx.put(tables::ORDER_KEYS, key, &order.id)?;
    }
    Ok(())
}

/// Delete an order together with everything it owns.
pub fn delete_order(tx: &mut Transaction, order: &Order) {
    tx.delete(tables::ORDERS, order.id.as_str());
    if let Some(key) = &order.idempotency_key {
        tx.delete(tables::ORDER_KEYS, key);
    }
}

pub async fn order_for_key(
    tx: &mut Transaction,
    idempotency_key: &str,
) -> Result<Option<OrderId>, CommerceError> {
    Ok(tx.get(tables::ORDER_KEYS, idempotency_key).await?)
}

// Discounts

pub async fn discount(tx: &mut Transaction, code: &str) -> Result<Option<Discount>, CommerceError> {
    Ok(tx.get(tables::DISCOUNTS, code).await?)
}

pub fn put_discount(tx: &mut Transaction, discount: &Discount) -> Result<(), CommerceError> {
    Ok(tx.put(tables::DISCOUNTS, &discount.code, discount)?)
}

pub async fn membership_discounts(
    tx: &mut Transaction,
) -> Result<Vec<MembershipDiscount>, CommerceError> {
    Ok(tx.scan(tables::MEMBERSHIP_DISCOUNTS).await?)
}

pub async fn membership_discount(
    tx: &mut Transaction,
    id: &DiscountId,
) -> Result<Option<MembershipDiscount>, CommerceError> {
    Ok(tx.get(tables::MEMBERSHIP_DISCOUNTS, id.as_str()).await?)
}

pub fn put_membership_discount(
    tx: &mut Transaction,
    discount: &MembershipDiscount,
) -> Result<(), CommerceError> {
    Ok(tx.put(tables::MEMBERSHIP_DISCOUNTS, discount.id.as_str(), discount)?)
}

pub async fn redemption(
    tx: &mut Transaction,
    code: &str,
    order_id: &OrderId,
) -> Result<Option<DiscountRedemption>, CommerceError> {
    let key = DiscountRedemption::key(code, order_id);
    Ok(tx.get(tables::DISCOUNT_REDEMPTIONS, &key).await?)
}

pub fn put_redemption(
    tx: &mut Transaction,
    redemption: &DiscountRedemption,
) -> Result<(), CommerceError> {
    let key = DiscountRedemption::key(&redemption.code, &redemption.order_id);
    Ok(tx.put(tables::DISCOUNT_REDEMPTIONS, &key, redemption)?)
}

pub fn delete_redemption(tx: &mut Transaction, code: &str, order_id: &OrderId) {
    tx.delete(
        tables::DISCOUNT_REDEMPTIONS,
        &DiscountRedemption::key(code, order_id),
    );
}

// Customers and settings

pub async fn customer(
    tx: &mut Transaction,
    user_id: &UserId,
) -> Result<Option<Customer>, CommerceError> {
    Ok(tx.get(tables::CUSTOMERS, user_id.as_str()).await?)
}

pub fn put_customer(tx: &mut Transaction, customer: &Customer) -> Result<(), CommerceError> {
    Ok(tx.put(tables::CUSTOMERS, customer.user_id.as_str(), customer)?)
}

pub async fn confirmation_settings(
    tx: &mut Transaction,
) -> Result<Option<OrderConfirmationSettings>, CommerceError> {
    Ok(tx
        .get(tables::SETTINGS, CONFIRMATION_SETTINGS_KEY)
        .await?)
}

pub fn put_confirmation_settings(
    tx: &mut Transaction,
    settings: &OrderConfirmationSettings,
) -> Result<(), CommerceError> {
    Ok(tx.put(tables::SETTINGS, CONFIRMATION_SETTINGS_KEY, settings)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_commerce::Currency;
    use storefront_db::Db;

    #[tokio::test]
    async fn test_missing_rows_map_to_domain_errors() {
        let db = Db::open_in_memory();
        let mut tx = db.begin();
        assert!(matches!(
            product(&mut tx, &ProductId::new("prod-x")).await,
            Err(CommerceError::ProductNotFound(_))
        ));
        assert!(matches!(
            order(&mut tx, &OrderId::new("ord-x")).await,
            Err(CommerceError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_product_round_trip() {
        let db = Db::open_in_memory();
        let item = Product::new("MUG", "Mug", Money::new(1_000, Currency::VND), 3)
            .unwrap()
            .with_id("prod-mug");

        let mut tx = db.begin();
        put_product(&mut tx, &item).unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.begin();
        assert_eq!(product(&mut tx, &item.id).await.unwrap(), item);
    }

    #[test]
    fn test_redemption_key() {
        assert_eq!(
            DiscountRedemption::key("SAVE10", &OrderId::new("ord-1")),
            "SAVE10:ord-1"
        );
    }
}
