//! Catalog administration.

use crate::repository::{self, tables};
use crate::retry::RetryPolicy;
use storefront_commerce::catalog::{
    AdjustmentReason, Inventory, InventoryAdjustment, Product, ProductStatus,
};
use storefront_commerce::{current_timestamp, CommerceError, Money, ProductId};
use storefront_db::Db;
use tracing::instrument;

/// Products and their inventory records.
#[derive(Clone)]
pub struct CatalogService {
    db: Db,
    retry: RetryPolicy,
}

impl CatalogService {
    pub fn new(db: Db, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    /// Add a product and open its inventory record with the product's stock.
    #[instrument(skip(self, product), fields(product_id = %product.id, sku = %product.sku))]
    pub async fn add_product(&self, product: Product) -> Result<Product, CommerceError> {
        if product.name.trim().is_empty() {
            return Err(CommerceError::ValidationError(
                "product name must not be empty".to_string(),
            ));
        }

        let product = &product;
        self.retry
            .run("catalog.add_product", || async move {
                let mut tx = self.db.begin();
                if tx
                    .get::<Product>(tables::PRODUCTS, product.id.as_str())
                    .await?
                    .is_some()
                {
                    return Err(CommerceError::ValidationError(format!(
                        "product {} already exists",
                        product.id
                    )));
                }

                let inventory = Inventory::new(product.id.clone(), product.stock, product.created_at);
                repository::put_product(&mut tx, product)?;
                repository::put_inventory(&mut tx, &inventory)?;
                repository::record_adjustment(
                    &mut tx,
                    &InventoryAdjustment::new(&inventory, product.stock, AdjustmentReason::Restock),
                )?;
                tx.commit().await?;
                Ok(())
            })
            .await?;

        tracing::info!(product_id = %product.id, stock = product.stock, "Product added");
        Ok(product.clone())
    }

    pub async fn get_product(&self, id: &ProductId) -> Result<Product, CommerceError> {
        self.db
            .get(tables::PRODUCTS, id.as_str())
            .await?
            .ok_or_else(|| CommerceError::ProductNotFound(id.to_string()))
    }

    /// All products, sorted by SKU.
    pub async fn list_products(&self) -> Result<Vec<Product>, CommerceError> {
        let mut products: Vec<Product> = self.db.scan(tables::PRODUCTS).await?;
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(products)
    }

    /// Change the price of future orders. Placed orders keep their snapshot.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn set_price(&self, id: &ProductId, price: Money) -> Result<Product, CommerceError> {
        if price.is_negative() {
            return Err(CommerceError::ValidationError(
                "price must not be negative".to_string(),
            ));
        }
        self.retry
            .run("catalog.set_price", || async move {
                let mut tx = self.db.begin();
                let mut product = repository::product(&mut tx, id).await?;
                product.price = price;
                product.updated_at = current_timestamp();
                repository::put_product(&mut tx, &product)?;
                tx.commit().await?;
                Ok(product)
            })
            .await
    }

    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn set_status(
        &self,
        id: &ProductId,
        status: ProductStatus,
    ) -> Result<Product, CommerceError> {
        self.retry
            .run("catalog.set_status", || async move {
                let mut tx = self.db.begin();
                let mut product = repository::product(&mut tx, id).await?;
                product.status = status;
                product.updated_at = current_timestamp();
                repository::put_product(&mut tx, &product)?;
                tx.commit().await?;
                Ok(product)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_commerce::Currency;

    fn mug() -> Product {
        Product::new("MUG", "Mug", Money::new(50_000, Currency::VND), 8)
            .unwrap()
            .with_id("prod-mug")
    }

    #[tokio::test]
    async fn test_add_product_opens_inventory() {
        let db = Db::open_in_memory();
        let catalog = CatalogService::new(db.clone(), RetryPolicy::default());
        catalog.add_product(mug()).await.unwrap();

        let inventory: Inventory = db.get(tables::INVENTORY, "prod-mug").await.unwrap().unwrap();
        assert_eq!(inventory.quantity, 8);
        assert_eq!(catalog.list_products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_product_rejected() {
        let catalog = CatalogService::new(Db::open_in_memory(), RetryPolicy::default());
        catalog.add_product(mug()).await.unwrap();
        assert!(matches!(
            catalog.add_product(mug()).await,
            Err(CommerceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_set_price_and_status() {
        let catalog = CatalogService::new(Db::open_in_memory(), RetryPolicy::default());
        let product = catalog.add_product(mug()).await.unwrap();

        let updated = catalog
            .set_price(&product.id, Money::new(60_000, Currency::VND))
            .await
            .unwrap();
        assert_eq!(updated.price.amount, 60_000);

        let archived = catalog
            .set_status(&product.id, ProductStatus::Archived)
            .await
            .unwrap();
        assert!(!archived.is_purchasable());
    }
}
