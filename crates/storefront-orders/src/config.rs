//! Service configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use storefront_commerce::cart::{DiscountPolicy, ShippingPolicy};
use storefront_commerce::membership::TierThresholds;
use storefront_commerce::{CommerceError, Currency, Money};

/// Pricing rules applied at checkout.
///
/// Amounts are in minor units of `currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Store currency.
    pub currency: Currency,
    /// Flat shipping fee per order.
    pub shipping_fee: i64,
    /// Discounted subtotal at or above which shipping is free.
    pub free_shipping_threshold: Option<i64>,
    /// How code and membership discounts combine.
    pub discount_policy: DiscountPolicy,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: Currency::VND,
            shipping_fee: 30_000,
            free_shipping_threshold: None,
            discount_policy: DiscountPolicy::Best,
        }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<(), CommerceError> {
        if self.shipping_fee < 0 {
            return Err(CommerceError::ValidationError(
                "shipping fee must not be negative".to_string(),
            ));
        }
        if matches!(self.free_shipping_threshold, Some(t) if t < 0) {
            return Err(CommerceError::ValidationError(
                "free shipping threshold must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy {
            flat_fee: Money::new(self.shipping_fee, self.currency),
            free_shipping_threshold: self
                .free_shipping_threshold
                .map(|t| Money::new(t, self.currency)),
        }
    }

    pub fn money(&self, amount: i64) -> Money {
        Money::new(amount, self.currency)
    }
}

/// Cumulative purchase totals for each membership tier, in minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipConfig {
    pub silver: i64,
    pub gold: i64,
    pub diamond: i64,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            silver: 5_000_000,
            gold: 20_000_000,
            diamond: 50_000_000,
        }
    }
}

impl MembershipConfig {
    pub fn thresholds(&self, currency: Currency) -> Result<TierThresholds, CommerceError> {
        TierThresholds::new(
            Money::new(self.silver, currency),
            Money::new(self.gold, currency),
            Money::new(self.diamond, currency),
        )
    }
}

/// Auto-confirmation sweep scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Shortest pause between two sweep cycles, whatever the stored delay.
    pub min_poll_seconds: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            min_poll_seconds: 60,
        }
    }
}

impl SweepConfig {
    pub fn min_poll(&self) -> Duration {
        Duration::from_secs(self.min_poll_seconds.max(1))
    }
}
