//! Retry utilities: backoff builder and contention-aware retry wrapper.
//!
//! Uses `backon` for exponential backoff with jitter. Only transient storage
//! contention is retried; business rejections never are.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{LedgerError, Result};

/// Backoff for ledger writes that lost a lock race.
pub fn ledger_backoff(config: &RetryConfig) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(config.min_delay())
        .with_max_delay(config.max_delay())
        .with_max_times(config.max_times)
        .with_jitter()
}

/// Run `operation`, retrying while it fails with a transient error.
///
/// Contention that outlasts the backoff surfaces as `ConcurrencyConflict`.
pub async fn retry_transient<T, F, Fut>(
    operation: &'static str,
    config: &RetryConfig,
    f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    f.retry(ledger_backoff(config))
        .when(LedgerError::is_transient)
        .notify(|err: &LedgerError, dur: Duration| {
            warn!(operation, error = %err, delay = ?dur, "Ledger write contended, retrying");
        })
        .await
        .map_err(LedgerError::into_conflict)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn fast() -> RetryConfig {
        RetryConfig {
            min_delay_ms: 1,
            max_delay_ms: 2,
            max_times: 3,
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result = retry_transient("test", &fast(), || async move {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LedgerError::ConcurrencyConflict("busy".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_business_errors_are_not_retried() {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result: Result<()> = retry_transient("test", &fast(), || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::InvariantViolation("below threshold".into()))
        })
        .await;

        assert!(matches!(result, Err(LedgerError::InvariantViolation(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_as_conflict() {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result: Result<()> = retry_transient("test", &fast(), || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::ConcurrencyConflict("busy".into()))
        })
        .await;

        assert!(matches!(result, Err(LedgerError::ConcurrencyConflict(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}
