//! Cart and line item types.

use crate::current_timestamp;
use crate::error::CommerceError;
use crate::ids::{CartId, LineItemId, ProductId, UserId};
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// Maximum quantity allowed per line item.
pub const MAX_QUANTITY_PER_ITEM: i64 = 9999;

/// A shopping cart.
///
/// Guests are identified by `session_token`; signed-in customers also carry
/// a `user_id`, which unlocks membership discounts at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    /// Unique cart identifier.
    pub id: CartId,
    /// Opaque session token for guest checkout.
    pub session_token: String,
    /// User ID for authenticated carts.
    pub user_id: Option<UserId>,
    /// Items in the cart.
    pub items: Vec<LineItem>,
    /// Cart currency.
    pub currency: Currency,
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Unix timestamp of last update.
    pub updated_at: i64,
}

impl Cart {
    /// Create a new cart for a guest session.
    pub fn new(session_token: impl Into<String>, currency: Currency) -> Self {
        let now = current_timestamp();
        Self {
            id: CartId::generate(),
            session_token: session_token.into(),
            user_id: None,
            items: Vec::new(),
            currency,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a cart for an authenticated user.
    pub fn for_user(user_id: UserId, session_token: impl Into<String>, currency: Currency) -> Self {
        let mut cart = Self::new(session_token, currency);
        cart.user_id = Some(user_id);
        cart
    }

    /// Add an item to the cart.
    ///
    /// Adding a product that is already in the cart increases its quantity.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: i64,
        unit_price: Money,
    ) -> Result<LineItemId, CommerceError> {
        if quantity <= 0 {
            return Err(CommerceError::InvalidQuantity(quantity));
        }
        if unit_price.currency != self.currency {
            return Err(CommerceError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                got: unit_price.currency.code().to_string(),
            });
        }

        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            let new_quantity = existing
                .quantity
                .checked_add(quantity)
                .ok_or(CommerceError::Overflow)?;
            if new_quantity > MAX_QUANTITY_PER_ITEM {
                return Err(CommerceError::QuantityExceedsLimit(
                    new_quantity,
                    MAX_QUANTITY_PER_ITEM,
                ));
            }
            existing.quantity = new_quantity;
            existing.update_total()?;
            self.updated_at = current_timestamp();
            return Ok(existing.id.clone());
        }

        if quantity > MAX_QUANTITY_PER_ITEM {
            return Err(CommerceError::QuantityExceedsLimit(
                quantity,
                MAX_QUANTITY_PER_ITEM,
            ));
        }

        let item = LineItem::new(product_id, product_name, quantity, unit_price)?;
        let id = item.id.clone();
        self.items.push(item);
        self.updated_at = current_timestamp();
        Ok(id)
    }

    /// Update item quantity. A quantity of zero or less removes the item.
    pub fn update_quantity(
        &mut self,
        line_item_id: &LineItemId,
        quantity: i64,
    ) -> Result<bool, CommerceError> {
        if quantity <= 0 {
            return Ok(self.remove_item(line_item_id));
        }
        if quantity > MAX_QUANTITY_PER_ITEM {
            return Err(CommerceError::QuantityExceedsLimit(
                quantity,
                MAX_QUANTITY_PER_ITEM,
            ));
        }

        match self.items.iter_mut().find(|i| &i.id == line_item_id) {
            Some(item) => {
                item.quantity = quantity;
                item.update_total()?;
                self.updated_at = current_timestamp();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove an item from the cart.
    pub fn remove_item(&mut self, line_item_id: &LineItemId) -> bool {
        let len_before = self.items.len();
        self.items.retain(|i| &i.id != line_item_id);
        let removed = self.items.len() < len_before;
        if removed {
            self.updated_at = current_timestamp();
        }
        removed
    }

    /// Clear all items from the cart.
    pub fn clear(&mut self) {
        self.items.clear();
        self.updated_at = current_timestamp();
    }

    /// Get total item count (sum of quantities).
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of line totals at the prices captured in the cart.
    pub fn subtotal(&self) -> Result<Money, CommerceError> {
        Money::try_sum(self.items.iter().map(|i| &i.total_price), self.currency)
            .ok_or(CommerceError::Overflow)
    }
}

/// A line item in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    /// Unique line item identifier.
    pub id: LineItemId,
    /// Product being purchased.
    pub product_id: ProductId,
    /// Product name (denormalized for display).
    pub product_name: String,
    /// Quantity.
    pub quantity: i64,
    /// Unit price when the item was added.
    pub unit_price: Money,
    /// Total price (unit_price * quantity).
    pub total_price: Money,
}

impl LineItem {
    /// Create a new line item.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: i64,
        unit_price: Money,
    ) -> Result<Self, CommerceError> {
        let total_price = unit_price
            .try_multiply(quantity)
            .ok_or(CommerceError::Overflow)?;
        Ok(Self {
            id: LineItemId::generate(),
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            total_price,
        })
    }

    /// Update the total price based on quantity.
    pub fn update_total(&mut self) -> Result<(), CommerceError> {
        self.total_price = self
            .unit_price
            .try_multiply(self.quantity)
            .ok_or(CommerceError::Overflow)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(amount: i64) -> Money {
        Money::new(amount, Currency::USD)
    }

    #[test]
    fn test_cart_creation() {
        let cart = Cart::new("session-123", Currency::USD);
        assert!(cart.is_empty());
        assert_eq!(cart.session_token, "session-123");
        assert!(cart.user_id.is_none());
    }

    #[test]
    fn test_add_same_product_increases_quantity() {
        let mut cart = Cart::new("session-123", Currency::USD);
        cart.add_item(ProductId::new("prod-1"), "Mug", 1, usd(1000))
            .unwrap();
        cart.add_item(ProductId::new("prod-1"), "Mug", 2, usd(1000))
            .unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.subtotal().unwrap(), usd(3000));
    }

    #[test]
    fn test_update_and_remove() {
        let mut cart = Cart::new("session-123", Currency::USD);
        let line_id = cart
            .add_item(ProductId::new("prod-1"), "Mug", 1, usd(1000))
            .unwrap();

        assert!(cart.update_quantity(&line_id, 5).unwrap());
        assert_eq!(cart.item_count(), 5);

        assert!(cart.update_quantity(&line_id, 0).unwrap());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_subtotal_over_several_lines() {
        let mut cart = Cart::new("session-123", Currency::USD);
        cart.add_item(ProductId::new("prod-1"), "A", 2, usd(1000))
            .unwrap();
        cart.add_item(ProductId::new("prod-2"), "B", 1, usd(2000))
            .unwrap();
        assert_eq!(cart.subtotal().unwrap(), usd(4000));
    }

    #[test]
    fn test_quantity_validation() {
        let mut cart = Cart::new("session-123", Currency::USD);
        assert!(matches!(
            cart.add_item(ProductId::new("prod-1"), "A", 0, usd(1000)),
            Err(CommerceError::InvalidQuantity(0))
        ));
        assert!(matches!(
            cart.add_item(ProductId::new("prod-1"), "A", MAX_QUANTITY_PER_ITEM + 1, usd(1000)),
            Err(CommerceError::QuantityExceedsLimit(..))
        ));
    }

    #[test]
    fn test_currency_must_match_cart() {
        let mut cart = Cart::new("session-123", Currency::VND);
        assert!(matches!(
            cart.add_item(ProductId::new("prod-1"), "A", 1, usd(1000)),
            Err(CommerceError::CurrencyMismatch { .. })
        ));
    }
}
