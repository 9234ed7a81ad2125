//! Pricing & discount resolution.
//!
//! Code discounts and membership discounts are resolved on two separate paths
//! and only combined at the end by a [`DiscountPolicy`]. Resolution never
//! writes; usage is counted by [`DiscountResolver::redeem_in`] when an order
//! is committed.

use crate::repository::{self, tables, DiscountRedemption};
use crate::retry::RetryPolicy;
use serde::Serialize;
use storefront_commerce::cart::{Discount, DiscountOutcome, DiscountPolicy, MembershipDiscount};
use storefront_commerce::membership::MembershipLevel;
use storefront_commerce::{current_timestamp, CommerceError, DiscountId, Money, OrderId};
use storefront_db::{Db, Transaction};
use tracing::instrument;

/// A stored discount with its validity at the time of listing.
#[derive(Debug, Clone, Serialize)]
pub struct DiscountListing<D> {
    pub discount: D,
    pub valid_now: bool,
}

/// Resolves and administers discounts.
#[derive(Clone)]
pub struct DiscountResolver {
    db: Db,
    retry: RetryPolicy,
}

impl DiscountResolver {
    pub fn new(db: Db, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    /// Resolve a discount code against a subtotal.
    ///
    /// An empty (or blank) code means no discount and resolves to `None`.
    pub async fn resolve_code(
        &self,
        code: &str,
        subtotal: &Money,
    ) -> Result<Option<DiscountOutcome>, CommerceError> {
        let mut tx = self.db.begin();
        self.resolve_code_in(&mut tx, code, subtotal, current_timestamp())
            .await
    }

    /// Resolve the best membership discount for `level`.
    ///
    /// Rules that do not apply (expired, exhausted, minimum not met) are
    /// skipped; `None` when no rule applies.
    pub async fn resolve_membership(
        &self,
        level: MembershipLevel,
        subtotal: &Money,
    ) -> Result<Option<DiscountOutcome>, CommerceError> {
        let mut tx = self.db.begin();
        self.resolve_membership_in(&mut tx, level, subtotal, current_timestamp())
            .await
    }

    /// Resolve both paths and compose them with `policy`.
    pub async fn resolve_discount(
        &self,
        code: Option<&str>,
        level: Option<MembershipLevel>,
        subtotal: &Money,
        policy: DiscountPolicy,
    ) -> Result<Vec<DiscountOutcome>, CommerceError> {
        let mut tx = self.db.begin();
        self.resolve_discount_in(&mut tx, code, level, subtotal, policy, current_timestamp())
            .await
    }

    pub async fn resolve_discount_in(
        &self,
        tx: &mut Transaction,
        code: Option<&str>,
        level: Option<MembershipLevel>,
        subtotal: &Money,
        policy: DiscountPolicy,
        now: i64,
    ) -> Result<Vec<DiscountOutcome>, CommerceError> {
        if subtotal.is_negative() {
            return Err(CommerceError::ValidationError(
                "subtotal must not be negative".to_string(),
            ));
        }

        let by_code = match code {
            Some(code) => self.resolve_code_in(tx, code, subtotal, now).await?,
            None => None,
        };
        let by_membership = match level {
            Some(level) => self.resolve_membership_in(tx, level, subtotal, now).await?,
            None => None,
        };
        Ok(policy.compose(by_code, by_membership, subtotal))
    }

    pub async fn resolve_code_in(
        &self,
        tx: &mut Transaction,
        code: &str,
        subtotal: &Money,
        now: i64,
    ) -> Result<Option<DiscountOutcome>, CommerceError> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }
        let discount = repository::discount(tx, code)
            .await?
            .ok_or_else(|| CommerceError::DiscountNotFound(code.to_string()))?;
        discount.resolve(subtotal, now).map(Some)
    }

    pub async fn resolve_membership_in(
        &self,
        tx: &mut Transaction,
        level: MembershipLevel,
        subtotal: &Money,
        now: i64,
    ) -> Result<Option<DiscountOutcome>, CommerceError> {
        let rules = repository::membership_discounts(tx).await?;
        let best = rules
            .iter()
            .filter(|rule| rule.membership_level == level)
            .filter_map(|rule| match rule.resolve(subtotal, now) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    tracing::debug!(discount_id = %rule.id, reason = %e, "Membership discount skipped");
                    None
                }
            })
            .max_by_key(|outcome| outcome.amount.amount);
        Ok(best)
    }

    /// Count a code redemption for `order_id`.
    ///
    /// Idempotent per (code, order): a second call for the same order finds
    /// the redemption row and changes nothing. Returns whether usage was
    /// incremented.
    pub async fn redeem_in(
        &self,
        tx: &mut Transaction,
        code: &str,
        order_id: &OrderId,
        amount: Money,
        now: i64,
    ) -> Result<bool, CommerceError> {
        if repository::redemption(tx, code, order_id).await?.is_some() {
            tracing::debug!(code, order_id = %order_id, "Discount already redeemed for order");
            return Ok(false);
        }

        let mut discount = repository::discount(tx, code)
            .await?
            .ok_or_else(|| CommerceError::DiscountNotFound(code.to_string()))?;
        if discount.terms.is_exhausted() {
            return Err(CommerceError::DiscountLimitReached(code.to_string()));
        }
        discount.record_usage(now);
        repository::put_discount(tx, &discount)?;
        repository::put_redemption(
            tx,
            &DiscountRedemption {
                code: code.to_string(),
                discount_id: discount.id.clone(),
                order_id: order_id.clone(),
                amount,
                redeemed_at: now,
            },
        )?;
        Ok(true)
    }

    /// Give back a redemption. No-op when the order never redeemed `code`.
    pub async fn release_in(
        &self,
        tx: &mut Transaction,
        code: &str,
        order_id: &OrderId,
        now: i64,
    ) -> Result<bool, CommerceError> {
        if repository::redemption(tx, code, order_id).await?.is_none() {
            return Ok(false);
        }
        repository::delete_redemption(tx, code, order_id);
        if let Some(mut discount) = repository::discount(tx, code).await? {
            discount.release_usage(now);
            repository::put_discount(tx, &discount)?;
        }
        Ok(true)
    }

    /// Redeem a code for an order in a transaction of its own.
    #[instrument(skip(self, amount), fields(order_id = %order_id))]
    pub async fn redeem_for_order(
        &self,
        code: &str,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<bool, CommerceError> {
        self.retry
            .run("discounts.redeem", || async move {
                let mut tx = self.db.begin();
                let counted = self
                    .redeem_in(&mut tx, code, order_id, amount, current_timestamp())
                    .await?;
                tx.commit().await?;
                Ok(counted)
            })
            .await
    }

    // Code discount administration

    /// Store a new code discount. Codes are unique, compared case-sensitively.
    #[instrument(skip(self, discount), fields(code = %discount.code))]
    pub async fn create_discount(&self, mut discount: Discount) -> Result<Discount, CommerceError> {
        discount.code = discount.code.trim().to_string();
        discount.validate()?;
        let discount = &discount;
        self.retry
            .run("discounts.create", || async move {
                let mut tx = self.db.begin();
                if repository::discount(&mut tx, &discount.code).await?.is_some() {
                    return Err(CommerceError::DuplicateDiscountCode(discount.code.clone()));
                }
                repository::put_discount(&mut tx, discount)?;
                tx.commit().await?;
                Ok(())
            })
            .await?;
        tracing::info!(code = %discount.code, value = %discount.terms.value.display(), "Discount created");
        Ok(discount.clone())
    }

    /// Replace a discount definition. The usage counter is kept.
    #[instrument(skip(self, discount), fields(code = %discount.code))]
    pub async fn update_discount(&self, mut discount: Discount) -> Result<Discount, CommerceError> {
        discount.code = discount.code.trim().to_string();
        discount.validate()?;
        let discount = &discount;
        self.retry
            .run("discounts.update", || async move {
                let mut tx = self.db.begin();
                let stored = repository::discount(&mut tx, &discount.code)
                    .await?
                    .ok_or_else(|| CommerceError::DiscountNotFound(discount.code.clone()))?;
                let mut updated = discount.clone();
                updated.id = stored.id;
                updated.created_at = stored.created_at;
                updated.terms.usage_count = stored.terms.usage_count;
                updated.updated_at = current_timestamp();
                repository::put_discount(&mut tx, &updated)?;
                tx.commit().await?;
                Ok(updated)
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn deactivate_discount(&self, code: &str) -> Result<Discount, CommerceError> {
        self.retry
            .run("discounts.deactivate", || async move {
                let mut tx = self.db.begin();
                let mut discount = repository::discount(&mut tx, code)
                    .await?
                    .ok_or_else(|| CommerceError::DiscountNotFound(code.to_string()))?;
                discount.terms.active = false;
                discount.updated_at = current_timestamp();
                repository::put_discount(&mut tx, &discount)?;
                tx.commit().await?;
                Ok(discount)
            })
            .await
    }

    /// Delete a code discount. Past orders keep their applied amounts.
    #[instrument(skip(self))]
    pub async fn delete_discount(&self, code: &str) -> Result<(), CommerceError> {
        let mut tx = self.db.begin();
        if repository::discount(&mut tx, code).await?.is_none() {
            return Err(CommerceError::DiscountNotFound(code.to_string()));
        }
        tx.delete(tables::DISCOUNTS, code);
        tx.commit().await?;
        tracing::info!(code, "Discount deleted");
        Ok(())
    }

    pub async fn get_discount(&self, code: &str) -> Result<Discount, CommerceError> {
        self.db
            .get(tables::DISCOUNTS, code)
            .await?
            .ok_or_else(|| CommerceError::DiscountNotFound(code.to_string()))
    }

    /// All code discounts sorted by code, with their validity right now.
    pub async fn list_discounts(&self) -> Result<Vec<DiscountListing<Discount>>, CommerceError> {
        let now = current_timestamp();
        let mut discounts: Vec<Discount> = self.db.scan(tables::DISCOUNTS).await?;
        discounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(discounts
            .into_iter()
            .map(|discount| DiscountListing {
                valid_now: discount.terms.is_valid_at(now),
                discount,
            })
            .collect())
    }

    // Membership discount administration

    #[instrument(skip(self, discount), fields(level = %discount.membership_level))]
    pub async fn create_membership_discount(
        &self,
        discount: MembershipDiscount,
    ) -> Result<MembershipDiscount, CommerceError> {
        discount.validate()?;
        let mut tx = self.db.begin();
        repository::put_membership_discount(&mut tx, &discount)?;
        tx.commit().await?;
        tracing::info!(
            discount_id = %discount.id,
            level = %discount.membership_level,
            "Membership discount created"
        );
        Ok(discount)
    }

    /// Membership discounts sorted by level, optionally for one level only.
    pub async fn list_membership_discounts(
        &self,
        level: Option<MembershipLevel>,
    ) -> Result<Vec<DiscountListing<MembershipDiscount>>, CommerceError> {
        let now = current_timestamp();
        let mut rules: Vec<MembershipDiscount> = self.db.scan(tables::MEMBERSHIP_DISCOUNTS).await?;
        rules.retain(|rule| level.map_or(true, |l| rule.membership_level == l));
        rules.sort_by(|a, b| {
            a.membership_level
                .cmp(&b.membership_level)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(rules
            .into_iter()
            .map(|discount| DiscountListing {
                valid_now: discount.terms.is_valid_at(now),
                discount,
            })
            .collect())
    }

    #[instrument(skip(self), fields(discount_id = %id))]
    pub async fn deactivate_membership_discount(
        &self,
        id: &DiscountId,
    ) -> Result<MembershipDiscount, CommerceError> {
        self.retry
            .run("discounts.deactivate_membership", || async move {
                let mut tx = self.db.begin();
                let mut rule = repository::membership_discount(&mut tx, id)
                    .await?
                    .ok_or_else(|| CommerceError::DiscountNotFound(id.to_string()))?;
                rule.terms.active = false;
                rule.updated_at = current_timestamp();
                repository::put_membership_discount(&mut tx, &rule)?;
                tx.commit().await?;
                Ok(rule)
            })
            .await
    }

    #[instrument(skip(self), fields(discount_id = %id))]
    pub async fn delete_membership_discount(&self, id: &DiscountId) -> Result<(), CommerceError> {
        let mut tx = self.db.begin();
        if repository::membership_discount(&mut tx, id).await?.is_none() {
            return Err(CommerceError::DiscountNotFound(id.to_string()));
        }
        tx.delete(tables::MEMBERSHIP_DISCOUNTS, id.as_str());
        tx.commit().await?;
        Ok(())
    }
}
