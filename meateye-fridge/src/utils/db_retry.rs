//! Retrying SQLite writes that hit lock contention
//!
//! The HTTP handlers and the delivery sweep share one database file. A write
//! that finds the file locked waits with a doubling delay and tries again
//! until the policy's wall-time budget is spent.

use meateye_common::Result;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Backoff policy for lock-contended writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRetry {
    /// Total wall time a single write may spend waiting
    pub budget: Duration,
    pub first_delay: Duration,
    pub max_delay: Duration,
}

impl Default for LockRetry {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(5),
            first_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl LockRetry {
    pub fn with_budget(budget: Duration) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_before(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.first_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `write`, retrying while it fails with `database is locked`
    ///
    /// Any other error is returned at once. When the budget runs out the last
    /// lock error is returned unchanged.
    pub async fn run<F, Fut, T>(&self, what: &str, mut write: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut retries = 0u32;

        loop {
            let err = match write().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!(what, retries, "Write went through after lock contention");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_lock_contention() => err,
                Err(err) => return Err(err),
            };

            retries += 1;
            let delay = self.delay_before(retries);
            if started.elapsed() + delay > self.budget {
                error!(
                    what,
                    retries,
                    budget_ms = self.budget.as_millis() as u64,
                    "Giving up on locked database"
                );
                return Err(err);
            }

            warn!(what, retry = retries, delay_ms = delay.as_millis() as u64, "Database locked, backing off");
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meateye_common::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn locked() -> Error {
        Error::Database(sqlx::Error::Protocol("database is locked".to_string()))
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = LockRetry::default();
        assert_eq!(policy.delay_before(1), Duration::from_millis(10));
        assert_eq!(policy.delay_before(2), Duration::from_millis(20));
        assert_eq!(policy.delay_before(4), Duration::from_millis(80));
        assert_eq!(policy.delay_before(8), Duration::from_secs(1));
        assert_eq!(policy.delay_before(40), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_lock_contention_is_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = LockRetry::default()
            .run("test", || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        Err(locked())
                    } else {
                        Ok(call)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = LockRetry::default()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::NotFound("row".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_budget_returns_lock_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = LockRetry::with_budget(Duration::ZERO)
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(locked()) }
            })
            .await;

        assert!(result.unwrap_err().is_lock_contention());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
