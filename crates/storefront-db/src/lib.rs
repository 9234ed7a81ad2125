//! Transactional row store for the storefront.
//!
//! Tables hold serde-serialized rows keyed by string. Work is grouped into
//! optimistic transactions: reads record the row version they saw, writes are
//! buffered, and commit applies everything atomically or fails with a
//! conflict that callers retry.
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_db::Db;
//!
//! let db = Db::open("storefront.db.json").await?;
//!
//! let mut tx = db.begin();
//! let mut inventory: Inventory = tx.get("inventory", "prod-1").await?.unwrap();
//! inventory.quantity -= 1;
//! tx.put("inventory", "prod-1", &inventory)?;
//! tx.commit().await?;
//! ```

mod db;
mod error;
mod types;

pub use db::{Db, Transaction};
pub use error::DbError;
pub use types::{Row, Table};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{Db, DbError, Transaction};
}
