//! Membership tracking backed by the customer table.

use crate::collaborators::MembershipTracker;
use crate::repository::{self, tables};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use storefront_commerce::membership::{Customer, MembershipLevel, TierThresholds};
use storefront_commerce::{current_timestamp, CommerceError, Money, UserId};
use storefront_db::Db;

/// [`MembershipTracker`] that keeps a cumulative total per customer.
#[derive(Clone)]
pub struct StoreMembershipTracker {
    db: Db,
    thresholds: TierThresholds,
    retry: RetryPolicy,
}

impl StoreMembershipTracker {
    pub fn new(db: Db, thresholds: TierThresholds, retry: RetryPolicy) -> Self {
        Self {
            db,
            thresholds,
            retry,
        }
    }

    /// Stored customer record, if the user ever completed an order.
    pub async fn get_customer(&self, user_id: &UserId) -> Result<Option<Customer>, CommerceError> {
        Ok(self.db.get(tables::CUSTOMERS, user_id.as_str()).await?)
    }

    /// Current level of a user; `Regular` for unknown users.
    pub async fn level_of(&self, user_id: &UserId) -> Result<MembershipLevel, CommerceError> {
        Ok(self
            .get_customer(user_id)
            .await?
            .map(|c| c.level)
            .unwrap_or(MembershipLevel::Regular))
    }
}

#[async_trait]
impl MembershipTracker for StoreMembershipTracker {
    async fn record_completed_order(
        &self,
        user_id: &UserId,
        order_amount: &Money,
    ) -> Result<(), CommerceError> {
        let thresholds = &self.thresholds;
        let customer = self
            .retry
            .run("membership.record", || async move {
                let now = current_timestamp();
                let mut tx = self.db.begin();
                let mut customer = repository::customer(&mut tx, user_id)
                    .await?
                    .unwrap_or_else(|| {
                        Customer::new(user_id.clone(), thresholds.currency(), now)
                    });
                let previous = customer.record_purchase(order_amount, thresholds, now)?;
                repository::put_customer(&mut tx, &customer)?;
                tx.commit().await?;
                Ok((customer, previous))
            })
            .await;

        match customer? {
            (customer, Some(previous)) => tracing::info!(
                user_id = %user_id,
                from = %previous,
                to = %customer.level,
                "Membership level changed"
            ),
            (customer, None) => tracing::debug!(
                user_id = %user_id,
                cumulative = %customer.cumulative_total,
                "Purchase recorded"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_commerce::Currency;

    fn vnd(amount: i64) -> Money {
        Money::new(amount, Currency::VND)
    }

    fn tracker() -> StoreMembershipTracker {
        let thresholds = TierThresholds::new(vnd(1_000), vnd(5_000), vnd(10_000)).unwrap();
        StoreMembershipTracker::new(Db::open_in_memory(), thresholds, RetryPolicy::default())
    }

    #[tokio::test]
    async fn test_unknown_user_is_regular() {
        let level = tracker().level_of(&UserId::new("user-1")).await.unwrap();
        assert_eq!(level, MembershipLevel::Regular);
    }

    #[tokio::test]
    async fn test_cumulative_total_promotes() {
        let tracker = tracker();
        let user = UserId::new("user-1");
        tracker.record_completed_order(&user, &vnd(800)).await.unwrap();
        assert_eq!(tracker.level_of(&user).await.unwrap(), MembershipLevel::Regular);

        tracker.record_completed_order(&user, &vnd(4_500)).await.unwrap();
        let customer = tracker.get_customer(&user).await.unwrap().unwrap();
        assert_eq!(customer.cumulative_total, vnd(5_300));
        assert_eq!(customer.level, MembershipLevel::Gold);
    }

    #[tokio::test]
    async fn test_currency_mismatch_rejected() {
        let tracker = tracker();
        let err = tracker
            .record_completed_order(&UserId::new("user-1"), &Money::new(10, Currency::USD))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::CurrencyMismatch { .. }));
    }
}
