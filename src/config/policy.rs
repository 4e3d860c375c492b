//! Ledger business policy: payout gating, attribution window, retries.

use std::time::Duration;

use serde::Deserialize;

use crate::money::Money;

/// Default minimum pending balance before a payout can be requested ($200.00).
pub const DEFAULT_MINIMUM_PAYOUT_CENTS: i64 = 20_000;

/// Default click-to-sale attribution window.
pub const DEFAULT_ATTRIBUTION_WINDOW_HOURS: u32 = 24;

/// Payout gating.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PayoutConfig {
    /// Pending balance an affiliate must reach before requesting a payout.
    pub minimum_threshold: Money,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            minimum_threshold: Money::from_cents(DEFAULT_MINIMUM_PAYOUT_CENTS),
        }
    }
}

/// Referral attribution.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    /// Clicks older than this at sale time are not credited.
    pub window_hours: u32,
}

impl AttributionConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.window_hours))
    }
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            window_hours: DEFAULT_ATTRIBUTION_WINDOW_HOURS,
        }
    }
}

/// Retry policy for writes that lose a lock race.
///
/// Only contention errors are retried; once attempts are exhausted the
/// caller sees a concurrency conflict.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_times: usize,
}

impl RetryConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 10,
            max_delay_ms: 1_000,
            max_times: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        assert_eq!(
            PayoutConfig::default().minimum_threshold.to_string(),
            "200.00"
        );
        assert_eq!(
            AttributionConfig::default().window(),
            chrono::Duration::hours(24)
        );
        let retry = RetryConfig::default();
        assert!(retry.min_delay() < retry.max_delay());
    }
}
