//! Shared fixtures for ledger integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use tempfile::TempDir;

use affiliate_ledger::config::StorageConfig;
use affiliate_ledger::model::{
    standard_products, AffiliateProfile, NewAffiliate, PayoutMethod, ProductCatalog,
    ProductDefinition,
};
use affiliate_ledger::services::{Ledger, LedgerPolicy, ManualClock};
use affiliate_ledger::storage;
use affiliate_ledger::tier::{Tier, TierCatalog};
use affiliate_ledger::Money;

pub const BASIC: &str = "meal_plan_basic_annual";
pub const INTERMEDIATE: &str = "meal_plan_intermediate_annual";

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

pub fn cents(amount: i64) -> Money {
    Money::from_cents(amount)
}

/// Policy with a one-cent payout minimum so small balances can be withdrawn.
pub fn any_balance_policy() -> LedgerPolicy {
    LedgerPolicy::default().with_minimum_payout(Money::from_cents(1))
}

pub fn products_with(extra: ProductDefinition) -> ProductCatalog {
    let mut products = standard_products();
    products.push(extra);
    ProductCatalog::new(products).unwrap()
}

/// Ledger on a private in-memory database with a manual clock.
pub async fn memory_ledger(
    products: ProductCatalog,
    policy: LedgerPolicy,
) -> (Ledger, Arc<ManualClock>) {
    let pool = storage::open(&StorageConfig::in_memory()).await.unwrap();
    with_clock(Ledger::new(pool, TierCatalog::standard(), products, policy))
}

fn file_config(dir: &TempDir) -> StorageConfig {
    StorageConfig {
        path: dir.path().join("ledger.db").to_string_lossy().into_owned(),
        max_connections: 8,
        busy_timeout_ms: 5_000,
    }
}

/// Ledger on a database file inside `dir`, with a multi-connection pool.
pub async fn file_ledger(dir: &TempDir, policy: LedgerPolicy) -> (Ledger, Arc<ManualClock>) {
    let pool = storage::open(&file_config(dir)).await.unwrap();
    with_clock(Ledger::new(
        pool,
        TierCatalog::standard(),
        ProductCatalog::standard(),
        policy,
    ))
}

fn with_clock(ledger: Ledger) -> (Ledger, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start()));
    (ledger.with_clock(clock.clone()), clock)
}

/// Register an affiliate earning `rate` percent on every standard plan.
pub async fn register(ledger: &Ledger, code: &str, rate: i64, tier: Tier) -> AffiliateProfile {
    ledger
        .register_affiliate(
            NewAffiliate::new(code, PayoutMethod::Pix)
                .with_rate("basic", Decimal::from(rate))
                .with_rate("intermediate", Decimal::from(rate))
                .with_tier(tier),
        )
        .await
        .unwrap()
}
