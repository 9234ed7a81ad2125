//! Discount codes, membership discounts and how they compose.

use crate::current_timestamp;
use crate::error::CommerceError;
use crate::ids::DiscountId;
use crate::membership::MembershipLevel;
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Value of a discount.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum DiscountValue {
    /// Percentage off, in `(0, 100]`.
    Percentage(f64),
    /// Fixed amount off.
    Fixed(Money),
}

impl DiscountValue {
    /// Check the value is usable.
    pub fn validate(&self) -> Result<(), CommerceError> {
        match self {
            DiscountValue::Percentage(percent) if !(*percent > 0.0 && *percent <= 100.0) => Err(
                CommerceError::ValidationError(format!(
                    "percentage must be in (0, 100], got {percent}"
                )),
            ),
            DiscountValue::Fixed(amount) if !amount.is_positive() => {
                Err(CommerceError::ValidationError(format!(
                    "fixed discount must be positive, got {amount}"
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn display(&self) -> String {
        match self {
            DiscountValue::Percentage(percent) => format!("{percent}%"),
            DiscountValue::Fixed(amount) => amount.display(),
        }
    }
}

/// Rules shared by code discounts and membership discounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscountTerms {
    /// Amount or percentage off.
    pub value: DiscountValue,
    /// Smallest subtotal the discount applies to.
    pub minimum_order_amount: Money,
    /// Upper bound on the discount amount.
    pub maximum_discount_amount: Option<Money>,
    /// Unix timestamp the window opens.
    pub starts_at: i64,
    /// Unix timestamp the window closes (`None` = open ended).
    pub ends_at: Option<i64>,
    /// Maximum number of redemptions (`None` = unlimited).
    pub usage_limit: Option<i64>,
    /// Redemptions so far.
    pub usage_count: i64,
    /// Administrative on/off switch.
    pub active: bool,
}

impl DiscountTerms {
    /// Terms with no minimum, no cap, no limit, valid from `starts_at` on.
    pub fn new(value: DiscountValue, starts_at: i64) -> Self {
        let currency = match value {
            DiscountValue::Fixed(amount) => amount.currency,
            DiscountValue::Percentage(_) => Default::default(),
        };
        Self {
            value,
            minimum_order_amount: Money::zero(currency),
            maximum_discount_amount: None,
            starts_at,
            ends_at: None,
            usage_limit: None,
            usage_count: 0,
            active: true,
        }
    }

    pub fn with_minimum_order(mut self, amount: Money) -> Self {
        self.minimum_order_amount = amount;
        self
    }

    pub fn with_maximum_discount(mut self, amount: Money) -> Self {
        self.maximum_discount_amount = Some(amount);
        self
    }

    pub fn with_usage_limit(mut self, limit: i64) -> Self {
        self.usage_limit = Some(limit);
        self
    }

    pub fn ending_at(mut self, timestamp: i64) -> Self {
        self.ends_at = Some(timestamp);
        self
    }

    /// Check the definition itself is consistent.
    pub fn validate_definition(&self) -> Result<(), CommerceError> {
        self.value.validate()?;
        if self.minimum_order_amount.is_negative() {
            return Err(CommerceError::ValidationError(
                "minimum order amount must not be negative".to_string(),
            ));
        }
        if let Some(cap) = self.maximum_discount_amount {
            if cap.is_negative() {
                return Err(CommerceError::ValidationError(
                    "maximum discount amount must not be negative".to_string(),
                ));
            }
        }
        if let Some(ends) = self.ends_at {
            if ends < self.starts_at {
                return Err(CommerceError::ValidationError(
                    "discount ends before it starts".to_string(),
                ));
            }
        }
        if matches!(self.usage_limit, Some(limit) if limit < 0) {
            return Err(CommerceError::ValidationError(
                "usage limit must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the discount could be redeemed at `now`, ignoring the subtotal.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.active && self.within_window(now) && !self.is_exhausted()
    }

    pub fn within_window(&self, now: i64) -> bool {
        now >= self.starts_at && self.ends_at.map(|ends| now <= ends).unwrap_or(true)
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_limit
            .map(|limit| self.usage_count >= limit)
            .unwrap_or(false)
    }

    /// Check the discount applies to `subtotal` at `now`.
    ///
    /// Checks run in a fixed order: window, active flag, usage limit,
    /// minimum order amount. `label` names the discount in errors.
    pub fn check(&self, label: &str, subtotal: &Money, now: i64) -> Result<(), CommerceError> {
        if now < self.starts_at {
            return Err(CommerceError::DiscountNotYetActive(label.to_string()));
        }
        if matches!(self.ends_at, Some(ends) if now > ends) {
            return Err(CommerceError::DiscountExpired(label.to_string()));
        }
        if !self.active {
            return Err(CommerceError::DiscountInactive(label.to_string()));
        }
        if self.is_exhausted() {
            return Err(CommerceError::DiscountLimitReached(label.to_string()));
        }

        let meets_minimum = match subtotal.partial_cmp(&self.minimum_order_amount) {
            Some(ordering) => ordering.is_ge(),
            // A zero minimum in another currency means "no minimum".
            None => self.minimum_order_amount.is_zero(),
        };
        if !meets_minimum {
            return Err(CommerceError::MinimumOrderNotMet {
                code: label.to_string(),
                minimum: self.minimum_order_amount,
                subtotal: *subtotal,
            });
        }
        Ok(())
    }

    /// Amount taken off `subtotal`. Always within `0..=subtotal` and the cap.
    pub fn compute(&self, subtotal: &Money) -> Result<Money, CommerceError> {
        if subtotal.is_negative() {
            return Err(CommerceError::ValidationError(
                "subtotal must not be negative".to_string(),
            ));
        }

        let raw = match self.value {
            DiscountValue::Percentage(percent) => subtotal.percentage(percent),
            DiscountValue::Fixed(amount) => {
                ensure_same_currency(subtotal, &amount)?;
                amount
            }
        };

        let mut amount = raw.min(*subtotal);
        if let Some(cap) = self.maximum_discount_amount {
            ensure_same_currency(subtotal, &cap)?;
            amount = amount.min(cap);
        }
        Ok(Money::new(amount.amount.max(0), subtotal.currency))
    }

    /// Validate and compute in one step.
    pub fn apply(&self, label: &str, subtotal: &Money, now: i64) -> Result<Money, CommerceError> {
        self.check(label, subtotal, now)?;
        self.compute(subtotal)
    }
}

fn ensure_same_currency(expected: &Money, got: &Money) -> Result<(), CommerceError> {
    if expected.currency != got.currency {
        return Err(CommerceError::CurrencyMismatch {
            expected: expected.currency.code().to_string(),
            got: got.currency.code().to_string(),
        });
    }
    Ok(())
}

/// A promotional code discount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discount {
    /// Unique discount identifier.
    pub id: DiscountId,
    /// Redemption code, matched case-sensitively.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Pricing rules.
    pub terms: DiscountTerms,
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Unix timestamp of last update.
    pub updated_at: i64,
}

impl Discount {
    pub fn new(code: impl Into<String>, name: impl Into<String>, terms: DiscountTerms) -> Self {
        let now = current_timestamp();
        Self {
            id: DiscountId::generate(),
            code: code.into().trim().to_string(),
            name: name.into(),
            terms,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a percentage discount valid from now on.
    pub fn percentage(code: impl Into<String>, name: impl Into<String>, percent: f64) -> Self {
        let terms = DiscountTerms::new(DiscountValue::Percentage(percent), current_timestamp());
        Self::new(code, name, terms)
    }

    /// Create a fixed amount discount valid from now on.
    pub fn fixed_amount(code: impl Into<String>, name: impl Into<String>, amount: Money) -> Self {
        let terms = DiscountTerms::new(DiscountValue::Fixed(amount), current_timestamp());
        Self::new(code, name, terms)
    }

    /// Check the definition can be stored.
    pub fn validate(&self) -> Result<(), CommerceError> {
        if self.code.trim().is_empty() {
            return Err(CommerceError::ValidationError(
                "discount code must not be empty".to_string(),
            ));
        }
        if self.code.trim() != self.code {
            return Err(CommerceError::ValidationError(
                "discount code must not start or end with whitespace".to_string(),
            ));
        }
        if self.code.contains(':') {
            return Err(CommerceError::ValidationError(
                "discount code must not contain ':'".to_string(),
            ));
        }
        self.terms.validate_definition()
    }

    /// Resolve the discount against a subtotal.
    pub fn resolve(&self, subtotal: &Money, now: i64) -> Result<DiscountOutcome, CommerceError> {
        let amount = self.terms.apply(&self.code, subtotal, now)?;
        Ok(DiscountOutcome {
            source: DiscountSource::Code(self.code.clone()),
            discount_id: self.id.clone(),
            name: self.name.clone(),
            amount,
        })
    }

    /// Count one redemption.
    pub fn record_usage(&mut self, now: i64) {
        self.terms.usage_count += 1;
        self.updated_at = now;
    }

    /// Give one redemption back.
    pub fn release_usage(&mut self, now: i64) {
        self.terms.usage_count = (self.terms.usage_count - 1).max(0);
        self.updated_at = now;
    }
}

/// A discount granted to every customer of a membership level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MembershipDiscount {
    pub id: DiscountId,
    pub membership_level: MembershipLevel,
    pub name: String,
    pub terms: DiscountTerms,
    pub created_at: i64,
    pub updated_at: i64,
}

impl MembershipDiscount {
    pub fn new(level: MembershipLevel, name: impl Into<String>, terms: DiscountTerms) -> Self {
        let now = current_timestamp();
        Self {
            id: DiscountId::generate(),
            membership_level: level,
            name: name.into(),
            terms,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), CommerceError> {
        self.terms.validate_definition()
    }

    /// Resolve the rule against a subtotal.
    pub fn resolve(&self, subtotal: &Money, now: i64) -> Result<DiscountOutcome, CommerceError> {
        let amount = self.terms.apply(&self.name, subtotal, now)?;
        Ok(DiscountOutcome {
            source: DiscountSource::Membership(self.membership_level),
            discount_id: self.id.clone(),
            name: self.name.clone(),
            amount,
        })
    }
}

/// Where an applied discount came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountSource {
    /// A redeemed promotional code.
    Code(String),
    /// The customer's membership level.
    Membership(MembershipLevel),
}

impl DiscountSource {
    pub fn code(&self) -> Option<&str> {
        match self {
            DiscountSource::Code(code) => Some(code),
            DiscountSource::Membership(_) => None,
        }
    }
}

/// A resolved discount: which rule, and how much it takes off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountOutcome {
    pub source: DiscountSource,
    pub discount_id: DiscountId,
    pub name: String,
    pub amount: Money,
}

/// How code and membership discounts combine when both apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiscountPolicy {
    /// Apply whichever is larger. Ties go to the code.
    #[default]
    Best,
    /// Apply the code discount when there is one, else the membership discount.
    PreferCode,
    /// Apply both, clamped to the subtotal.
    Combine,
}

impl DiscountPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountPolicy::Best => "best",
            DiscountPolicy::PreferCode => "prefer_code",
            DiscountPolicy::Combine => "combine",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "best" => Some(DiscountPolicy::Best),
            "prefer_code" => Some(DiscountPolicy::PreferCode),
            "combine" => Some(DiscountPolicy::Combine),
            _ => None,
        }
    }

    /// Pick the discounts to apply to `subtotal`.
    ///
    /// The returned amounts never add up to more than the subtotal.
    pub fn compose(
        &self,
        code: Option<DiscountOutcome>,
        membership: Option<DiscountOutcome>,
        subtotal: &Money,
    ) -> Vec<DiscountOutcome> {
        let chosen: Vec<DiscountOutcome> = match (self, code, membership) {
            (_, None, None) => Vec::new(),
            (_, Some(one), None) | (_, None, Some(one)) => vec![one],
            (DiscountPolicy::PreferCode, Some(code), Some(_)) => vec![code],
            (DiscountPolicy::Best, Some(code), Some(membership)) => {
                if membership.amount.amount > code.amount.amount {
                    vec![membership]
                } else {
                    vec![code]
                }
            }
            (DiscountPolicy::Combine, Some(code), Some(membership)) => vec![code, membership],
        };

        let mut remaining = subtotal.amount.max(0);
        chosen
            .into_iter()
            .map(|mut outcome| {
                let amount = outcome.amount.amount.clamp(0, remaining);
                remaining -= amount;
                outcome.amount = Money::new(amount, subtotal.currency);
                outcome
            })
            .collect()
    }
}
