//! Product types.

use crate::current_timestamp;
use crate::error::CommerceError;
use crate::ids::ProductId;
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Product status in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProductStatus {
    /// Product is in draft mode, not visible to customers.
    Draft,
    /// Product is active and purchasable.
    #[default]
    Active,
    /// Product is archived, not purchasable but data preserved.
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "draft",
            ProductStatus::Active => "active",
            ProductStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(ProductStatus::Draft),
            "active" => Some(ProductStatus::Active),
            "archived" => Some(ProductStatus::Archived),
            _ => None,
        }
    }
}

/// A product in the catalog.
///
/// `stock` is the authoritative quantity; the matching [`Inventory`] record
/// mirrors it and carries the stock-level thresholds and timestamps.
///
/// [`Inventory`]: crate::catalog::Inventory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,
    /// Stock keeping unit.
    pub sku: String,
    /// Product name.
    pub name: String,
    /// Current unit price.
    pub price: Money,
    /// Units on hand.
    pub stock: i64,
    /// Product visibility status.
    pub status: ProductStatus,
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Unix timestamp of last update.
    pub updated_at: i64,
}

impl Product {
    /// Create a new active product.
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        price: Money,
        stock: i64,
    ) -> Result<Self, CommerceError> {
        if price.is_negative() {
            return Err(CommerceError::ValidationError(
                "price must not be negative".to_string(),
            ));
        }
        if stock < 0 {
            return Err(CommerceError::InvalidQuantity(stock));
        }

        let now = current_timestamp();
        Ok(Self {
            id: ProductId::generate(),
            sku: sku.into(),
            name: name.into(),
            price,
            stock,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    /// Use a specific identifier instead of a generated one.
    pub fn with_id(mut self, id: impl Into<ProductId>) -> Self {
        self.id = id.into();
        self
    }

    /// Check if the product can be added to a cart.
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Active
    }
}
