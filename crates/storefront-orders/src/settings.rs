//! Stored auto-confirmation settings.

use crate::repository;
use storefront_commerce::checkout::OrderConfirmationSettings;
use storefront_commerce::{current_timestamp, CommerceError, Currency};
use storefront_db::Db;

/// Read and write the single [`OrderConfirmationSettings`] row.
///
/// Nothing caches the row: every caller gets what is stored right now.
#[derive(Clone)]
pub struct SettingsStore {
    db: Db,
    currency: Currency,
}

impl SettingsStore {
    pub fn new(db: Db, currency: Currency) -> Self {
        Self { db, currency }
    }

    /// Current settings, or disabled defaults when none were saved.
    pub async fn load(&self) -> Result<OrderConfirmationSettings, CommerceError> {
        let mut tx = self.db.begin();
        Ok(repository::confirmation_settings(&mut tx)
            .await?
            .unwrap_or_else(|| OrderConfirmationSettings::disabled(self.currency)))
    }

    /// Validate and replace the settings.
    pub async fn update(
        &self,
        mut settings: OrderConfirmationSettings,
    ) -> Result<OrderConfirmationSettings, CommerceError> {
        settings.validate()?;
        settings.updated_at = current_timestamp();

        let mut tx = self.db.begin();
        repository::put_confirmation_settings(&mut tx, &settings)?;
        tx.commit().await?;

        tracing::info!(
            enabled = settings.auto_confirm_enabled,
            delay_minutes = settings.confirmation_delay_minutes,
            exclude_cod = settings.exclude_cash_on_delivery,
            exclude_high_value = settings.exclude_high_value,
            "Order confirmation settings updated"
        );
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_commerce::Money;

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let store = SettingsStore::new(Db::open_in_memory(), Currency::VND);
        let settings = store.load().await.unwrap();
        assert!(!settings.auto_confirm_enabled);
    }

    #[tokio::test]
    async fn test_update_is_visible_to_next_load() {
        let store = SettingsStore::new(Db::open_in_memory(), Currency::VND);
        let mut settings = store.load().await.unwrap();
        settings.auto_confirm_enabled = true;
        settings.confirmation_delay_minutes = 5;
        store.update(settings).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert!(loaded.auto_confirm_enabled);
        assert_eq!(loaded.confirmation_delay_minutes, 5);
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let store = SettingsStore::new(Db::open_in_memory(), Currency::VND);
        let settings = OrderConfirmationSettings {
            exclude_high_value: true,
            high_value_threshold: Money::zero(Currency::VND),
            ..OrderConfirmationSettings::disabled(Currency::VND)
        };
        assert!(store.update(settings).await.is_err());
        assert!(!store.load().await.unwrap().exclude_high_value);
    }
}
