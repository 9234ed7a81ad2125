//! Auto-confirmation settings.

use crate::checkout::{Order, OrderStatus};
use crate::error::CommerceError;
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// Process-wide rules for confirming pending orders automatically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderConfirmationSettings {
    /// Master switch. When off, no order is ever auto-confirmed.
    pub auto_confirm_enabled: bool,
    /// Minimum order age before confirmation.
    pub confirmation_delay_minutes: i64,
    /// Leave cash-on-delivery orders for manual review.
    pub exclude_cash_on_delivery: bool,
    /// Leave orders at or above `high_value_threshold` for manual review.
    pub exclude_high_value: bool,
    pub high_value_threshold: Money,
    /// Unix timestamp of last update.
    pub updated_at: i64,
}

/// Why the sweep would or would not confirm an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    NotPending,
    /// Card or e-wallet order whose payment has not cleared yet.
    AwaitingPayment,
    TooRecent,
    ExcludedCashOnDelivery,
    ExcludedHighValue,
}

impl OrderConfirmationSettings {
    /// Disabled settings with a 30 minute delay.
    pub fn disabled(currency: Currency) -> Self {
        Self {
            auto_confirm_enabled: false,
            confirmation_delay_minutes: 30,
            exclude_cash_on_delivery: false,
            exclude_high_value: false,
            high_value_threshold: Money::zero(currency),
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), CommerceError> {
        if self.confirmation_delay_minutes < 0 {
            return Err(CommerceError::ValidationError(
                "confirmation delay must not be negative".to_string(),
            ));
        }
        if self.exclude_high_value && !self.high_value_threshold.is_positive() {
            return Err(CommerceError::ValidationError(
                "high value threshold must be positive when the exclusion is on".to_string(),
            ));
        }
        Ok(())
    }

    /// Latest creation time an order may have to be confirmed at `now`.
    pub fn created_before(&self, now: i64) -> i64 {
        now.saturating_sub(self.confirmation_delay_minutes.saturating_mul(60))
    }

    /// Classify an order against these settings at `now`.
    ///
    /// Does not look at `auto_confirm_enabled`; callers check that once per
    /// cycle.
    pub fn eligibility(&self, order: &Order, now: i64) -> Eligibility {
        if order.status != OrderStatus::Pending {
            return Eligibility::NotPending;
        }
        if order.payment_method.requires_synchronous_confirmation() && !order.is_paid() {
            return Eligibility::AwaitingPayment;
        }
        if order.created_at > self.created_before(now) {
            return Eligibility::TooRecent;
        }
        if self.exclude_cash_on_delivery && order.payment_method.is_cash_on_delivery() {
            return Eligibility::ExcludedCashOnDelivery;
        }
        if self.exclude_high_value
            && order
                .total
                .partial_cmp(&self.high_value_threshold)
                .is_some_and(|o| o.is_ge())
        {
            return Eligibility::ExcludedHighValue;
        }
        Eligibility::Eligible
    }
}
