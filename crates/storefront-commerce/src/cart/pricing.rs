//! Cart and order pricing calculations.

use crate::cart::DiscountOutcome;
use crate::error::CommerceError;
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// Flat-rate shipping with an optional free-shipping threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ShippingPolicy {
    /// Fee charged per order.
    pub flat_fee: Money,
    /// Orders at or above this amount (after discounts) ship free.
    pub free_shipping_threshold: Option<Money>,
}

impl ShippingPolicy {
    /// No shipping charge at all.
    pub fn free(currency: Currency) -> Self {
        Self {
            flat_fee: Money::zero(currency),
            free_shipping_threshold: None,
        }
    }

    /// Shipping fee for an order whose discounted subtotal is `amount`.
    pub fn fee_for(&self, amount: &Money) -> Money {
        match self.free_shipping_threshold {
            Some(threshold) if amount.partial_cmp(&threshold).is_some_and(|o| o.is_ge()) => {
                Money::zero(self.flat_fee.currency)
            }
            _ => self.flat_fee,
        }
    }
}

/// Complete pricing breakdown for a cart or order.
///
/// Invariants: `0 <= discount_total <= subtotal` and
/// `total == subtotal - discount_total + shipping_fee >= 0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingBreakdown {
    /// Subtotal before discounts.
    pub subtotal: Money,
    /// Discounts applied, in application order.
    pub discounts: Vec<DiscountOutcome>,
    /// Sum of all applied discounts.
    pub discount_total: Money,
    /// Shipping cost.
    pub shipping_fee: Money,
    /// Amount due.
    pub total: Money,
}

impl PricingBreakdown {
    /// Build a breakdown, enforcing the pricing invariants.
    pub fn compute(
        subtotal: Money,
        discounts: Vec<DiscountOutcome>,
        shipping: &ShippingPolicy,
    ) -> Result<Self, CommerceError> {
        if subtotal.is_negative() {
            return Err(CommerceError::ValidationError(
                "subtotal must not be negative".to_string(),
            ));
        }
        let currency = subtotal.currency;
        let mismatch = |got: Currency| CommerceError::CurrencyMismatch {
            expected: currency.code().to_string(),
            got: got.code().to_string(),
        };

        let discount_total = Money::try_sum(discounts.iter().map(|d| &d.amount), currency)
            .ok_or_else(|| {
                discounts
                    .iter()
                    .find(|d| d.amount.currency != currency)
                    .map(|d| mismatch(d.amount.currency))
                    .unwrap_or(CommerceError::Overflow)
            })?;
        if discount_total.is_negative() || discount_total.amount > subtotal.amount {
            return Err(CommerceError::ValidationError(format!(
                "discount {discount_total} outside 0..={subtotal}"
            )));
        }

        let after_discount = subtotal
            .try_subtract(&discount_total)
            .ok_or(CommerceError::Overflow)?;
        let shipping_fee = shipping.fee_for(&after_discount);
        let total = after_discount
            .try_add(&shipping_fee)
            .ok_or_else(|| mismatch(shipping_fee.currency))?;
        if total.is_negative() {
            return Err(CommerceError::ValidationError(format!(
                "order total {total} is negative"
            )));
        }

        Ok(Self {
            subtotal,
            discounts,
            discount_total,
            shipping_fee,
            total,
        })
    }

    /// Check if any discounts are applied.
    pub fn has_discounts(&self) -> bool {
        self.discount_total.is_positive()
    }

    /// Codes of applied code discounts.
    pub fn discount_codes(&self) -> impl Iterator<Item = &str> {
        self.discounts.iter().filter_map(|d| d.source.code())
    }
}
