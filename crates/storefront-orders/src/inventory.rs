//! Inventory ledger.
//!
//! The only writer of stock quantities. Product `stock` and the inventory
//! record's `quantity` are always written together in one transaction.

use crate::collaborators::Notifier;
use crate::repository::{self, tables};
use crate::retry::RetryPolicy;
use std::sync::Arc;
use storefront_commerce::catalog::{AdjustmentReason, Inventory, InventoryAdjustment, Product};
use storefront_commerce::{current_timestamp, CommerceError, OrderId, ProductId};
use storefront_db::{Db, Transaction};
use tracing::instrument;

/// A stock mutation, reported back so low-stock notifications can be sent
/// once the surrounding transaction has committed.
#[derive(Debug, Clone)]
pub struct StockChange {
    pub product: Product,
    pub inventory: Inventory,
    /// Whether the product was already low on stock before the change.
    pub was_low: bool,
}

impl StockChange {
    /// The change moved the product into low stock.
    pub fn crossed_low_stock(&self) -> bool {
        !self.was_low && self.inventory.is_low_stock()
    }
}

/// Inventory ledger service.
#[derive(Clone)]
pub struct InventoryLedger {
    db: Db,
    retry: RetryPolicy,
    notifier: Arc<dyn Notifier>,
}

impl InventoryLedger {
    pub fn new(db: Db, retry: RetryPolicy, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            retry,
            notifier,
        }
    }

    /// Take stock out for a product.
    ///
    /// Fails with [`CommerceError::InsufficientInventory`] if fewer than `quantity`
    /// units are on hand; nothing changes then.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn deduct(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Inventory, CommerceError> {
        let change = self
            .retry
            .run("inventory.deduct", || async move {
                let mut tx = self.db.begin();
                let change = self
                    .deduct_in(&mut tx, product_id, quantity, None, current_timestamp())
                    .await?;
                tx.commit().await?;
                Ok(change)
            })
            .await?;

        self.notify_low_stock(std::slice::from_ref(&change)).await;
        Ok(change.inventory)
    }

    /// Put stock back for a product (supplier restock).
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn restock(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Inventory, CommerceError> {
        let change = self
            .retry
            .run("inventory.restock", || async move {
                let mut tx = self.db.begin();
                let change = self
                    .restock_in(
                        &mut tx,
                        product_id,
                        quantity,
                        AdjustmentReason::Restock,
                        None,
                        current_timestamp(),
                    )
                    .await?;
                tx.commit().await?;
                Ok(change)
            })
            .await?;
        Ok(change.inventory)
    }

    /// Deduct inside a caller's transaction.
    pub async fn deduct_in(
        &self,
        tx: &mut Transaction,
        product_id: &ProductId,
        quantity: i64,
        order_id: Option<&OrderId>,
        now: i64,
    ) -> Result<StockChange, CommerceError> {
        let (mut product, mut inventory) = load_stock(tx, product_id, now).await?;
        let was_low = inventory.is_low_stock();

        inventory.deduct(quantity, &product.name, now)?;
        product.stock = inventory.quantity;
        product.updated_at = now;

        repository::put_product(tx, &product)?;
        repository::put_inventory(tx, &inventory)?;
        repository::record_adjustment(
            tx,
            &InventoryAdjustment::new(&inventory, -quantity, AdjustmentReason::Sale)
                .with_order(order_id),
        )?;

        tracing::debug!(
            product_id = %product_id,
            quantity,
            remaining = inventory.quantity,
            "Stock deducted"
        );
        Ok(StockChange {
            product,
            inventory,
            was_low,
        })
    }

    /// Restock inside a caller's transaction.
    pub async fn restock_in(
        &self,
        tx: &mut Transaction,
        product_id: &ProductId,
        quantity: i64,
        reason: AdjustmentReason,
        order_id: Option<&OrderId>,
        now: i64,
    ) -> Result<StockChange, CommerceError> {
        let (mut product, mut inventory) = load_stock(tx, product_id, now).await?;
        let was_low = inventory.is_low_stock();

        inventory.restock(quantity, now)?;
        product.stock = inventory.quantity;
        product.updated_at = now;

        if inventory.is_overstocked() {
            tracing::warn!(
                product_id = %product_id,
                quantity = inventory.quantity,
                maximum = inventory.maximum_stock_level,
                "Stock above maximum level"
            );
        }

        repository::put_product(tx, &product)?;
        repository::put_inventory(tx, &inventory)?;
        repository::record_adjustment(
            tx,
            &InventoryAdjustment::new(&inventory, quantity, reason).with_order(order_id),
        )?;

        Ok(StockChange {
            product,
            inventory,
            was_low,
        })
    }

    /// Return an order line's stock, tolerating products deleted since.
    pub async fn return_stock_in(
        &self,
        tx: &mut Transaction,
        product_id: &ProductId,
        quantity: i64,
        order_id: &OrderId,
        now: i64,
    ) -> Result<Option<StockChange>, CommerceError> {
        match self
            .restock_in(tx, product_id, quantity, AdjustmentReason::Return, Some(order_id), now)
            .await
        {
            Ok(change) => Ok(Some(change)),
            Err(CommerceError::ProductNotFound(_)) => {
                tracing::warn!(
                    product_id = %product_id,
                    order_id = %order_id,
                    quantity,
                    "Product no longer exists, stock not returned"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Rebuild every inventory record from its product's stock field.
    ///
    /// Creates missing records and corrects diverged quantities. Negative
    /// product stock is reset to zero on the product too. Returns the number
    /// of products whose records were created or changed.
    #[instrument(skip(self))]
    pub async fn synchronize(&self) -> Result<usize, CommerceError> {
        let touched = self
            .retry
            .run("inventory.synchronize", || async move {
                let now = current_timestamp();
                let mut tx = self.db.begin();
                let products: Vec<Product> = tx.scan(tables::PRODUCTS).await?;
                let mut touched = 0;

                for product in &products {
                    let stock = product.stock.max(0);
                    let mut repaired = false;
                    if stock != product.stock {
                        tracing::warn!(
                            product_id = %product.id,
                            stock = product.stock,
                            "Negative product stock reset to zero"
                        );
                        let mut product = product.clone();
                        product.stock = stock;
                        product.updated_at = now;
                        repository::put_product(&mut tx, &product)?;
                        repaired = true;
                    }

                    let current = repository::inventory(&mut tx, &product.id).await?;
                    let updated = match current {
                        None => Some(Inventory::new(product.id.clone(), stock, now)),
                        Some(mut inv) if inv.quantity != stock => {
                            inv.set_quantity(stock, now)?;
                            Some(inv)
                        }
                        Some(_) => None,
                    };

                    if repaired && updated.is_none() {
                        touched += 1;
                    }
                    if let Some(inventory) = updated {
                        repository::put_inventory(&mut tx, &inventory)?;
                        repository::record_adjustment(
                            &mut tx,
                            &InventoryAdjustment::new(
                                &inventory,
                                0,
                                AdjustmentReason::Synchronization,
                            ),
                        )?;
                        touched += 1;
                    }
                }

                tx.commit().await?;
                Ok(touched)
            })
            .await?;

        tracing::info!(touched, "Inventory synchronized from product stock");
        Ok(touched)
    }

    /// Inventory record for a product.
    pub async fn get(&self, product_id: &ProductId) -> Result<Inventory, CommerceError> {
        let mut tx = self.db.begin();
        let (_, inventory) = load_stock(&mut tx, product_id, current_timestamp()).await?;
        Ok(inventory)
    }

    /// All products at or below their minimum stock level.
    pub async fn low_stock(&self) -> Result<Vec<Inventory>, CommerceError> {
        let all: Vec<Inventory> = self.db.scan(tables::INVENTORY).await?;
        Ok(all.into_iter().filter(|inv| inv.is_low_stock()).collect())
    }

    /// Audit trail for one product, oldest first.
    pub async fn adjustments(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<InventoryAdjustment>, CommerceError> {
        let all: Vec<InventoryAdjustment> = self.db.scan(tables::INVENTORY_ADJUSTMENTS).await?;
        let mut rows: Vec<_> = all
            .into_iter()
            .filter(|adj| &adj.product_id == product_id)
            .collect();
        rows.sort_by_key(|adj| adj.timestamp);
        Ok(rows)
    }

    /// Change the low/high stock thresholds.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn set_levels(
        &self,
        product_id: &ProductId,
        minimum: i64,
        maximum: i64,
    ) -> Result<Inventory, CommerceError> {
        self.retry
            .run("inventory.set_levels", || async move {
                let now = current_timestamp();
                let mut tx = self.db.begin();
                let (_, mut inventory) = load_stock(&mut tx, product_id, now).await?;
                inventory.set_levels(minimum, maximum, now)?;
                repository::put_inventory(&mut tx, &inventory)?;
                tx.commit().await?;
                Ok(inventory)
            })
            .await
    }

    /// Manually correct the quantity on hand.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Inventory, CommerceError> {
        let change = self
            .retry
            .run("inventory.set_quantity", || async move {
                let now = current_timestamp();
                let mut tx = self.db.begin();
                let (mut product, mut inventory) = load_stock(&mut tx, product_id, now).await?;
                let was_low = inventory.is_low_stock();
                let delta = quantity - inventory.quantity;

                inventory.set_quantity(quantity, now)?;
                product.stock = quantity;
                product.updated_at = now;

                repository::put_product(&mut tx, &product)?;
                repository::put_inventory(&mut tx, &inventory)?;
                repository::record_adjustment(
                    &mut tx,
                    &InventoryAdjustment::new(&inventory, delta, AdjustmentReason::Correction),
                )?;
                tx.commit().await?;
                Ok(StockChange {
                    product,
                    inventory,
                    was_low,
                })
            })
            .await?;

        self.notify_low_stock(std::slice::from_ref(&change)).await;
        Ok(change.inventory)
    }

    /// Send low-stock notifications for changes that crossed the threshold.
    ///
    /// Failures are logged and swallowed.
    pub async fn notify_low_stock(&self, changes: &[StockChange]) {
        for change in changes.iter().filter(|c| c.crossed_low_stock()) {
            if let Err(e) = self
                .notifier
                .send_low_stock_notification(&change.product, &change.inventory)
                .await
            {
                tracing::warn!(
                    product_id = %change.product.id,
                    error = %e,
                    "Failed to send low stock notification"
                );
            }
        }
    }
}

/// Load a product and its inventory record, creating the record from the
/// product's stock if it does not exist yet.
async fn load_stock(
    tx: &mut Transaction,
    product_id: &ProductId,
    now: i64,
) -> Result<(Product, Inventory), CommerceError> {
    let product = repository::product(tx, product_id).await?;
    let inventory = match repository::inventory(tx, product_id).await? {
        Some(inventory) => inventory,
        None => Inventory::new(product.id.clone(), product.stock, now),
    };
    Ok((product, inventory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogService;
    use crate::collaborators::LogNotifier;
    use storefront_commerce::{Currency, Money};

    async fn setup(stock: i64) -> (InventoryLedger, ProductId) {
        let db = Db::open_in_memory();
        let catalog = CatalogService::new(db.clone(), RetryPolicy::default());
        let product = Product::new("MUG", "Mug", Money::new(50_000, Currency::VND), stock)
            .unwrap()
            .with_id("prod-mug");
        catalog.add_product(product).await.unwrap();
        let ledger = InventoryLedger::new(db, RetryPolicy::default(), Arc::new(LogNotifier));
        (ledger, ProductId::new("prod-mug"))
    }

    #[tokio::test]
    async fn test_deduct_then_restock_round_trips() {
        let (ledger, id) = setup(20).await;
        ledger.deduct(&id, 4).await.unwrap();
        let inv = ledger.restock(&id, 4).await.unwrap();
        assert_eq!(inv.quantity, 20);
        assert!(inv.last_restock_date.is_some());
    }

    #[tokio::test]
    async fn test_deduct_keeps_product_stock_in_step() {
        let (ledger, id) = setup(5).await;
        ledger.deduct(&id, 5).await.unwrap();

        let product: Product = ledger.db.get(tables::PRODUCTS, id.as_str()).await.unwrap().unwrap();
        let inventory = ledger.get(&id).await.unwrap();
        assert_eq!(product.stock, 0);
        assert_eq!(inventory.quantity, 0);
        assert!(inventory.last_stock_out_date.is_some());
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let (ledger, id) = setup(1).await;
        let before = ledger.adjustments(&id).await.unwrap().len();

        let err = ledger.deduct(&id, 2).await.unwrap_err();
        assert!(matches!(err, CommerceError::InsufficientInventory { .. }));
        assert_eq!(ledger.get(&id).await.unwrap().quantity, 1);
        assert_eq!(ledger.adjustments(&id).await.unwrap().len(), before);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (ledger, _) = setup(1).await;
        let err = ledger.deduct(&ProductId::new("prod-none"), 1).await.unwrap_err();
        assert!(matches!(err, CommerceError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_synchronize_repairs_drift() {
        let (ledger, id) = setup(12).await;

        // Simulate a product edited outside the ledger.
        let mut tx = ledger.db.begin();
        let mut product = repository::product(&mut tx, &id).await.unwrap();
        product.stock = 30;
        repository::put_product(&mut tx, &product).unwrap();
        tx.commit().await.unwrap();

        assert_eq!(ledger.synchronize().await.unwrap(), 1);
        assert_eq!(ledger.get(&id).await.unwrap().quantity, 30);
        assert_eq!(ledger.synchronize().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_synchronize_resets_negative_product_stock() {
        let (ledger, id) = setup(4).await;

        let mut tx = ledger.db.begin();
        let mut product = repository::product(&mut tx, &id).await.unwrap();
        product.stock = -3;
        repository::put_product(&mut tx, &product).unwrap();
        tx.commit().await.unwrap();

        assert_eq!(ledger.synchronize().await.unwrap(), 1);
        assert_eq!(ledger.get(&id).await.unwrap().quantity, 0);
        let mut tx = ledger.db.begin();
        assert_eq!(repository::product(&mut tx, &id).await.unwrap().stock, 0);
        assert_eq!(ledger.synchronize().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_low_stock_listing() {
        let (ledger, id) = setup(15).await;
        assert!(ledger.low_stock().await.unwrap().is_empty());
        ledger.deduct(&id, 5).await.unwrap();
        let low = ledger.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product_id, id);
    }

    #[tokio::test]
    async fn test_set_levels_and_quantity() {
        let (ledger, id) = setup(15).await;
        ledger.set_levels(&id, 20, 40).await.unwrap();
        assert!(ledger.get(&id).await.unwrap().is_low_stock());

        let inv = ledger.set_quantity(&id, 3).await.unwrap();
        assert_eq!(inv.quantity, 3);
        let history = ledger.adjustments(&id).await.unwrap();
        assert_eq!(history.last().unwrap().quantity_change, -12);
    }
}
