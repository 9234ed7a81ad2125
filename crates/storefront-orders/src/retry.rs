//! Retry policy for optimistic write conflicts.

use std::future::Future;
use std::time::Duration;
use storefront_commerce::CommerceError;

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff with base and max.
    Exponential {
        /// Initial delay.
        base: Duration,
        /// Maximum delay.
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(d) => *d,
            Self::Exponential { base, max } => {
                let multiplier = 2u32.saturating_pow(attempt.min(16));
                std::cmp::min(base.saturating_mul(multiplier), *max)
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(2),
            max: Duration::from_millis(100),
        }
    }
}

/// How often a transaction is re-run after a write conflict.
///
/// Only [`CommerceError::is_conflict`] errors are retried; every other error
/// is returned on the first attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_attempts: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::default(),
        }
    }

    /// Create a policy with no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            backoff: BackoffStrategy::None,
        }
    }

    /// Set backoff strategy.
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Check if `err` on attempt `attempt` (0-indexed) should be retried.
    pub fn should_retry(&self, err: &CommerceError, attempt: u32) -> bool {
        attempt < self.max_attempts && err.is_conflict()
    }

    /// Wait before retry number `attempt`.
    pub async fn pause(&self, operation: &str, attempt: u32) {
        let delay = self.backoff.delay_for_attempt(attempt);
        tracing::debug!(operation, attempt, delay_ms = delay.as_millis() as u64, "Write conflict, retrying");
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
    }

    /// Run `op` until it succeeds, fails with a non-conflict error, or the
    /// retries are used up.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, CommerceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CommerceError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(err) if self.should_retry(&err, attempt) => {
                    self.pause(operation, attempt).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_conflict() {
                        tracing::warn!(operation, attempts = attempt + 1, "Giving up after repeated write conflicts");
                    }
                    return Err(err);
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use storefront_db::DbError;

    fn conflict() -> CommerceError {
        DbError::Conflict {
            table: "inventory".to_string(),
            key: "prod-1".to_string(),
        }
        .into()
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = BackoffStrategy::Exponential {
            base: Duration::from_millis(10),
            max: Duration::from_millis(50),
        };
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(10));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(40));
        assert_eq!(backoff.delay_for_attempt(30), Duration::from_millis(50));
    }

    #[test]
    fn test_only_conflicts_are_retried() {
        let policy = RetryPolicy::new(3);
        assert!(policy.should_retry(&conflict(), 0));
        assert!(!policy.should_retry(&conflict(), 3));
        assert!(!policy.should_retry(&CommerceError::EmptyCart, 0));
    }

    #[tokio::test]
    async fn test_run_retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(5).with_backoff(BackoffStrategy::None);
        let result = policy
            .run("test", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(conflict())
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_gives_up() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(2).with_backoff(BackoffStrategy::None);
        let result: Result<(), _> = policy
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(conflict())
            })
            .await;
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
