//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.
//! Money columns hold minor units (cents) as INTEGER so that balance updates
//! are exact single-statement increments.

use sea_query::Iden;

/// Affiliate profiles and their running balances.
#[derive(Iden)]
pub enum Affiliates {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "code"]
    Code,
    #[iden = "base_rates"]
    BaseRates,
    #[iden = "tier"]
    Tier,
    #[iden = "tier_rank"]
    TierRank,
    #[iden = "lifetime_sales"]
    LifetimeSales,
    #[iden = "total_conversions"]
    TotalConversions,
    #[iden = "total_earned"]
    TotalEarned,
    #[iden = "pending_balance"]
    PendingBalance,
    #[iden = "payout_method"]
    PayoutMethod,
    #[iden = "active"]
    Active,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Tracked click-throughs.
#[derive(Iden)]
pub enum Referrals {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "affiliate_id"]
    AffiliateId,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "converted"]
    Converted,
    #[iden = "sale_id"]
    SaleId,
}

/// Commission-bearing sales.
#[derive(Iden)]
pub enum Sales {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "affiliate_id"]
    AffiliateId,
    #[iden = "referral_id"]
    ReferralId,
    #[iden = "product_id"]
    ProductId,
    #[iden = "plan_name"]
    PlanName,
    #[iden = "sale_amount"]
    SaleAmount,
    #[iden = "commission_rate"]
    CommissionRate,
    #[iden = "commission"]
    Commission,
    #[iden = "commission_status"]
    CommissionStatus,
    #[iden = "transaction_ref"]
    TransactionRef,
    #[iden = "customer_ref"]
    CustomerRef,
    #[iden = "subscription_ref"]
    SubscriptionRef,
    #[iden = "metadata"]
    Metadata,
    /// Per-affiliate position in ledger-application order; NULL while pending.
    #[iden = "ledger_seq"]
    LedgerSeq,
    #[iden = "created_at"]
    CreatedAt,
}

/// Monthly commission rollups.
#[derive(Iden)]
pub enum MonthlyAggregates {
    Table,
    #[iden = "affiliate_id"]
    AffiliateId,
    #[iden = "year"]
    Year,
    #[iden = "month"]
    Month,
    #[iden = "sale_count"]
    SaleCount,
    #[iden = "sale_amount"]
    SaleAmount,
    #[iden = "commission_earned"]
    CommissionEarned,
    #[iden = "commission_pending"]
    CommissionPending,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Withdrawal requests.
#[derive(Iden)]
pub enum PayoutRequests {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "affiliate_id"]
    AffiliateId,
    #[iden = "amount"]
    Amount,
    #[iden = "method"]
    Method,
    #[iden = "status"]
    Status,
    #[iden = "rejection_reason"]
    RejectionReason,
    #[iden = "requested_at"]
    RequestedAt,
    #[iden = "processed_at"]
    ProcessedAt,
    #[iden = "completed_at"]
    CompletedAt,
}

/// SQL for creating the ledger tables.
pub const CREATE_LEDGER_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS affiliates (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    base_rates TEXT NOT NULL,
    tier TEXT NOT NULL,
    tier_rank INTEGER NOT NULL,
    lifetime_sales INTEGER NOT NULL DEFAULT 0,
    total_conversions INTEGER NOT NULL DEFAULT 0,
    total_earned INTEGER NOT NULL DEFAULT 0,
    pending_balance INTEGER NOT NULL DEFAULT 0 CHECK (pending_balance >= 0),
    payout_method TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS referrals (
    id TEXT PRIMARY KEY,
    affiliate_id TEXT NOT NULL REFERENCES affiliates(id),
    created_at TEXT NOT NULL,
    converted INTEGER NOT NULL DEFAULT 0,
    sale_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_referrals_open
    ON referrals(affiliate_id, converted, created_at);

CREATE TABLE IF NOT EXISTS sales (
    id TEXT PRIMARY KEY,
    affiliate_id TEXT NOT NULL REFERENCES affiliates(id),
    referral_id TEXT REFERENCES referrals(id),
    product_id TEXT NOT NULL,
    plan_name TEXT NOT NULL,
    sale_amount INTEGER NOT NULL,
    commission_rate TEXT NOT NULL,
    commission INTEGER NOT NULL,
    commission_status TEXT NOT NULL,
    transaction_ref TEXT UNIQUE,
    customer_ref TEXT,
    subscription_ref TEXT,
    metadata TEXT,
    ledger_seq INTEGER,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sales_affiliate_status
    ON sales(affiliate_id, commission_status, ledger_seq);

CREATE TABLE IF NOT EXISTS monthly_aggregates (
    affiliate_id TEXT NOT NULL REFERENCES affiliates(id),
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    sale_count INTEGER NOT NULL DEFAULT 0,
    sale_amount INTEGER NOT NULL DEFAULT 0,
    commission_earned INTEGER NOT NULL DEFAULT 0,
    commission_pending INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (affiliate_id, year, month)
);

CREATE TABLE IF NOT EXISTS payout_requests (
    id TEXT PRIMARY KEY,
    affiliate_id TEXT NOT NULL REFERENCES affiliates(id),
    amount INTEGER NOT NULL CHECK (amount > 0),
    method TEXT NOT NULL,
    status TEXT NOT NULL,
    rejection_reason TEXT,
    requested_at TEXT NOT NULL,
    processed_at TEXT,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_payout_requests_affiliate
    ON payout_requests(affiliate_id, requested_at);
"#;
