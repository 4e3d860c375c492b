//! Ledger service: the write and read operations over the affiliate ledger.
//!
//! Every mutating operation runs inside one `BEGIN IMMEDIATE` transaction and
//! either commits all of its effects or none. Lock contention is retried with
//! backoff and reported as a concurrency conflict once retries run out.

mod affiliates;
mod clock;
mod ingestion;
mod payouts;
mod referrals;


use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::{Config, RetryConfig};
use crate::error::Result;
use crate::model::ProductCatalog;
use crate::money::Money;
use crate::tier::TierCatalog;

pub use clock::{Clock, ManualClock, SystemClock};

/// Business policy knobs applied by the ledger.
#[derive(Debug, Clone)]
pub struct LedgerPolicy {
    /// Pending balance required before a payout may be requested.
    pub minimum_payout: Money,
    /// How far back a click may be and still be credited with a sale.
    pub attribution_window: chrono::Duration,
    pub retry: RetryConfig,
}

impl LedgerPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            minimum_payout: config.payout.minimum_threshold,
            attribution_window: config.attribution.window(),
            retry: config.retry.clone(),
        }
    }

    pub fn with_minimum_payout(mut self, minimum: Money) -> Self {
        self.minimum_payout = minimum;
        self
    }
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Handle to the affiliate ledger. Cheap to clone.
#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
    tiers: Arc<TierCatalog>,
    products: Arc<ProductCatalog>,
    policy: Arc<LedgerPolicy>,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(
        pool: SqlitePool,
        tiers: TierCatalog,
        products: ProductCatalog,
        policy: LedgerPolicy,
    ) -> Self {
        Self {
            pool,
            tiers: Arc::new(tiers),
            products: Arc::new(products),
            policy: Arc::new(policy),
            clock: Arc::new(SystemClock),
        }
    }

    /// Build from loaded configuration, validating both catalogs.
    pub fn from_config(pool: SqlitePool, config: &Config) -> Result<Self> {
        Ok(Self::new(
            pool,
            config.tier_catalog()?,
            config.product_catalog()?,
            LedgerPolicy::from_config(config),
        ))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tiers(&self) -> &TierCatalog {
        &self.tiers
    }

    pub fn products(&self) -> &ProductCatalog {
        &self.products
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("policy", &self.policy)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
