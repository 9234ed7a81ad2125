//! Auto-confirmation sweep.
//!
//! Each cycle re-reads [`OrderConfirmationSettings`] from the store, moves
//! every eligible pending order to Processing through
//! [`OrderService::update_status`], and reports what it did. A failure on one
//! order is logged and the sweep moves on to the next.
//!
//! [`OrderConfirmationSettings`]: storefront_commerce::checkout::OrderConfirmationSettings

use crate::orders::{OrderFilter, OrderService};
use crate::settings::SettingsStore;
use serde::Serialize;
use std::time::Duration;
use storefront_commerce::checkout::{Eligibility, OrderStatus};
use storefront_commerce::{current_timestamp, CommerceError};
use tokio_util::sync::CancellationToken;

/// What one sweep cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Whether auto-confirmation was switched on for this cycle.
    pub enabled: bool,
    /// Confirmation delay in force for this cycle.
    pub delay_minutes: i64,
    /// Pending orders old enough and not excluded.
    pub selected: usize,
    pub confirmed: usize,
    pub failed: usize,
    pub skipped_cod: usize,
    pub skipped_high_value: usize,
    /// The cycle stopped early because of shutdown.
    pub cancelled: bool,
}

impl SweepReport {
    fn log(&self) {
        if !self.enabled {
            tracing::debug!("Auto-confirmation disabled, sweep skipped");
            return;
        }
        tracing::info!(
            selected = self.selected,
            confirmed = self.confirmed,
            failed = self.failed,
            skipped_cod = self.skipped_cod,
            skipped_high_value = self.skipped_high_value,
            cancelled = self.cancelled,
            "Auto-confirmation sweep finished"
        );
    }
}

/// Periodic auto-confirmation of pending orders.
pub struct AutoConfirmSweep {
    orders: OrderService,
    settings: SettingsStore,
    min_poll: Duration,
    shutdown: CancellationToken,
}

impl AutoConfirmSweep {
    pub fn new(
        orders: OrderService,
        settings: SettingsStore,
        min_poll: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orders,
            settings,
            min_poll,
            shutdown,
        }
    }

    /// Run one cycle now.
    pub async fn sweep(&self) -> Result<SweepReport, CommerceError> {
        self.sweep_at(current_timestamp()).await
    }

    /// Run one cycle as if the time were `now`.
    pub async fn sweep_at(&self, now: i64) -> Result<SweepReport, CommerceError> {
        let settings = self.settings.load().await?;
        let mut report = SweepReport {
            enabled: settings.auto_confirm_enabled,
            delay_minutes: settings.confirmation_delay_minutes,
            ..Default::default()
        };
        if !settings.auto_confirm_enabled {
            return Ok(report);
        }

        let pending = OrderFilter {
            status: Some(OrderStatus::Pending),
            ..Default::default()
        };
        let mut candidates = self.orders.list_orders(&pending).await?;
        candidates.sort_by_key(|o| o.created_at);

        let mut selected = Vec::new();
        for order in candidates {
            match settings.eligibility(&order, now) {
                Eligibility::Eligible => selected.push(order.id),
                Eligibility::ExcludedCashOnDelivery => report.skipped_cod += 1,
                Eligibility::ExcludedHighValue => report.skipped_high_value += 1,
                Eligibility::NotPending
                | Eligibility::AwaitingPayment
                | Eligibility::TooRecent => {}
            }
        }
        report.selected = selected.len();

        for order_id in &selected {
            if self.shutdown.is_cancelled() {
                tracing::info!(
                    remaining = report.selected - report.confirmed - report.failed,
                    "Sweep interrupted by shutdown"
                );
                report.cancelled = true;
                break;
            }
            match self
                .orders
                .update_status(order_id, OrderStatus::Processing)
                .await
            {
                Ok(_) => report.confirmed += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(order_id = %order_id, error = %e, "Failed to auto-confirm order");
                }
            }
        }

        Ok(report)
    }

    /// Pause before the next cycle: the stored delay, but never shorter
    /// than the minimum poll interval.
    pub fn period_for(&self, delay_minutes: i64) -> Duration {
        let minutes = u64::try_from(delay_minutes).unwrap_or(0);
        let delay = Duration::from_secs(minutes.saturating_mul(60));
        delay.max(self.min_poll)
    }

    /// Sweep until the shutdown token is cancelled.
    ///
    /// Cycles never overlap: the next pause starts after the previous cycle
    /// has finished.
    pub async fn run(self) {
        tracing::info!(min_poll_secs = self.min_poll.as_secs(), "Auto-confirmation sweep started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let period = match self.sweep().await {
                Ok(report) => {
                    report.log();
                    self.period_for(report.delay_minutes)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Auto-confirmation sweep failed");
                    self.min_poll
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = self.shutdown.cancelled() => break,
            }
        }

        tracing::info!("Auto-confirmation sweep stopped");
    }
}
