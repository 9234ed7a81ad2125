//! Membership tiers derived from cumulative purchases.

use crate::error::CommerceError;
use crate::ids::UserId;
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Customer tier, ordered from lowest to highest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum MembershipLevel {
    #[default]
    Regular,
    Silver,
    Gold,
    Diamond,
}

impl MembershipLevel {
    pub const ALL: [MembershipLevel; 4] = [
        MembershipLevel::Regular,
        MembershipLevel::Silver,
        MembershipLevel::Gold,
        MembershipLevel::Diamond,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipLevel::Regular => "regular",
            MembershipLevel::Silver => "silver",
            MembershipLevel::Gold => "gold",
            MembershipLevel::Diamond => "diamond",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "regular" => Some(MembershipLevel::Regular),
            "silver" => Some(MembershipLevel::Silver),
            "gold" => Some(MembershipLevel::Gold),
            "diamond" => Some(MembershipLevel::Diamond),
            _ => None,
        }
    }
}

impl fmt::Display for MembershipLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MembershipLevel::Regular => "Regular",
            MembershipLevel::Silver => "Silver",
            MembershipLevel::Gold => "Gold",
            MembershipLevel::Diamond => "Diamond",
        };
        f.write_str(name)
    }
}

/// Cumulative purchase totals needed to reach each tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TierThresholds {
    pub silver: Money,
    pub gold: Money,
    pub diamond: Money,
}

impl TierThresholds {
    /// Build thresholds, checking they increase strictly.
    pub fn new(silver: Money, gold: Money, diamond: Money) -> Result<Self, CommerceError> {
        let thresholds = Self {
            silver,
            gold,
            diamond,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), CommerceError> {
        let increasing = self.silver.is_positive()
            && self.silver.partial_cmp(&self.gold).is_some_and(|o| o.is_lt())
            && self.gold.partial_cmp(&self.diamond).is_some_and(|o| o.is_lt());
        if !increasing {
            return Err(CommerceError::ValidationError(
                "membership thresholds must be positive and strictly increasing in one currency"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Tier for a cumulative purchase total.
    pub fn level_for(&self, cumulative: &Money) -> MembershipLevel {
        let reached = |threshold: &Money| cumulative.partial_cmp(threshold).is_some_and(|o| o.is_ge());
        if reached(&self.diamond) {
            MembershipLevel::Diamond
        } else if reached(&self.gold) {
            MembershipLevel::Gold
        } else if reached(&self.silver) {
            MembershipLevel::Silver
        } else {
            MembershipLevel::Regular
        }
    }

    pub fn currency(&self) -> Currency {
        self.silver.currency
    }
}

/// A customer's purchase history summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub user_id: UserId,
    /// Sum of completed order totals.
    pub cumulative_total: Money,
    pub level: MembershipLevel,
    /// Unix timestamp of last update.
    pub updated_at: i64,
}

impl Customer {
    pub fn new(user_id: UserId, currency: Currency, now: i64) -> Self {
        Self {
            user_id,
            cumulative_total: Money::zero(currency),
            level: MembershipLevel::Regular,
            updated_at: now,
        }
    }

    /// Add a completed order and recompute the tier.
    ///
    /// Returns the previous level when the tier changed.
    pub fn record_purchase(
        &mut self,
        amount: &Money,
        thresholds: &TierThresholds,
        now: i64,
    ) -> Result<Option<MembershipLevel>, CommerceError> {
        self.cumulative_total = self.cumulative_total.try_add(amount).ok_or_else(|| {
            CommerceError::CurrencyMismatch {
                expected: self.cumulative_total.currency.code().to_string(),
                got: amount.currency.code().to_string(),
            }
        })?;
        self.updated_at = now;

        let previous = self.level;
        self.level = thresholds.level_for(&self.cumulative_total);
        Ok((previous != self.level).then_some(previous))
    }
}
