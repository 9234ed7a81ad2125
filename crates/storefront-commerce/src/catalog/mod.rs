//! Product catalog module.
//!
//! Contains products and their per-product inventory records.

mod inventory;
mod product;

pub use inventory::{AdjustmentReason, Inventory, InventoryAdjustment};
pub use product::{Product, ProductStatus};
