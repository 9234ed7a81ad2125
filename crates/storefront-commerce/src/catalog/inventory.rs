//! Inventory tracking types.

use crate::error::CommerceError;
use crate::ids::{OrderId, ProductId};
use serde::{Deserialize, Serialize};

/// Default low-stock threshold for new inventory records.
pub const DEFAULT_MINIMUM_STOCK_LEVEL: i64 = 10;

/// Default upper stock level for new inventory records.
pub const DEFAULT_MAXIMUM_STOCK_LEVEL: i64 = 1000;

/// Stock record for one product.
///
/// Invariant: `quantity >= 0`. Every mutation goes through [`Inventory::deduct`],
/// [`Inventory::restock`] or [`Inventory::set_quantity`], which uphold it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Inventory {
    /// Product this record belongs to.
    pub product_id: ProductId,
    /// Units on hand.
    pub quantity: i64,
    /// At or below this level the product counts as low stock.
    pub minimum_stock_level: i64,
    /// Restocking above this level is allowed but flagged.
    pub maximum_stock_level: i64,
    /// Unix timestamp of the last restock.
    pub last_restock_date: Option<i64>,
    /// Unix timestamp at which stock last hit zero.
    pub last_stock_out_date: Option<i64>,
    /// Unix timestamp of last update.
    pub updated_at: i64,
}

impl Inventory {
    /// Create a record with default stock levels.
    pub fn new(product_id: ProductId, quantity: i64, now: i64) -> Self {
        Self {
            product_id,
            quantity: quantity.max(0),
            minimum_stock_level: DEFAULT_MINIMUM_STOCK_LEVEL,
            maximum_stock_level: DEFAULT_MAXIMUM_STOCK_LEVEL,
            last_restock_date: None,
            last_stock_out_date: if quantity <= 0 { Some(now) } else { None },
            updated_at: now,
        }
    }

    /// Check if a specific quantity is available.
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        self.quantity >= quantity
    }

    /// Check if stock is at or below the minimum level.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.minimum_stock_level
    }

    /// Check if stock exceeds the maximum level.
    pub fn is_overstocked(&self) -> bool {
        self.quantity > self.maximum_stock_level
    }

    /// Check if out of stock.
    pub fn is_out_of_stock(&self) -> bool {
        self.quantity == 0
    }

    /// Take `quantity` units out of stock.
    ///
    /// `product_name` is only used to build the error message.
    pub fn deduct(
        &mut self,
        quantity: i64,
        product_name: &str,
        now: i64,
    ) -> Result<(), CommerceError> {
        if quantity <= 0 {
            return Err(CommerceError::InvalidQuantity(quantity));
        }
        if !self.can_fulfill(quantity) {
            return Err(CommerceError::InsufficientInventory {
                product_id: self.product_id.to_string(),
                product_name: product_name.to_string(),
                requested: quantity,
                available: self.quantity,
            });
        }

        self.quantity -= quantity;
        if self.quantity == 0 {
            self.last_stock_out_date = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Put `quantity` units back into stock.
    pub fn restock(&mut self, quantity: i64, now: i64) -> Result<(), CommerceError> {
        if quantity <= 0 {
            return Err(CommerceError::InvalidQuantity(quantity));
        }
        self.quantity = self
            .quantity
            .checked_add(quantity)
            .ok_or(CommerceError::Overflow)?;
        self.last_restock_date = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Overwrite the quantity (manual correction or synchronization).
    pub fn set_quantity(&mut self, quantity: i64, now: i64) -> Result<(), CommerceError> {
        if quantity < 0 {
            return Err(CommerceError::InvalidQuantity(quantity));
        }
        if quantity == 0 && self.quantity != 0 {
            self.last_stock_out_date = Some(now);
        }
        self.quantity = quantity;
        self.updated_at = now;
        Ok(())
    }

    /// Change the low/high stock thresholds.
    pub fn set_levels(&mut self, minimum: i64, maximum: i64, now: i64) -> Result<(), CommerceError> {
        if minimum < 0 || maximum < minimum {
            return Err(CommerceError::ValidationError(format!(
                "stock levels must satisfy 0 <= minimum <= maximum, got {minimum}..{maximum}"
            )));
        }
        self.minimum_stock_level = minimum;
        self.maximum_stock_level = maximum;
        self.updated_at = now;
        Ok(())
    }
}

/// Reason for an inventory adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjustmentReason {
    /// Reserved by a newly placed order.
    Sale,
    /// Returned by a cancelled, refunded or deleted order.
    Return,
    /// Restocked from supplier.
    Restock,
    /// Manual correction.
    Correction,
    /// Rebuilt from the product's stock field.
    Synchronization,
}

impl AdjustmentReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentReason::Sale => "sale",
            AdjustmentReason::Return => "return",
            AdjustmentReason::Restock => "restock",
            AdjustmentReason::Correction => "correction",
            AdjustmentReason::Synchronization => "synchronization",
        }
    }
}

/// An inventory adjustment record (audit trail).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryAdjustment {
    /// Product that was adjusted.
    pub product_id: ProductId,
    /// Change in quantity (positive or negative).
    pub quantity_change: i64,
    /// Quantity after the adjustment.
    pub quantity_after: i64,
    /// Reason for the adjustment.
    pub reason: AdjustmentReason,
    /// Order that caused the adjustment, if any.
    pub order_id: Option<OrderId>,
    /// Unix timestamp of adjustment.
    pub timestamp: i64,
}

impl InventoryAdjustment {
    pub fn new(inventory: &Inventory, quantity_change: i64, reason: AdjustmentReason) -> Self {
        Self {
            product_id: inventory.product_id.clone(),
            quantity_change,
            quantity_after: inventory.quantity,
            reason,
            order_id: None,
            timestamp: inventory.updated_at,
        }
    }

    pub fn with_order(mut self, order_id: Option<&OrderId>) -> Self {
        self.order_id = order_id.cloned();
        self
    }
}
