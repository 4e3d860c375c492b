//! Affiliate profiles and the balance ledger columns.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_query::{Expr, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::model::AffiliateProfile;
use crate::money::Money;
use crate::storage::helpers::{get_count, get_money, get_timestamp, get_uuid, timestamp};
use crate::storage::schema::Affiliates;
use crate::tier::TierDefinition;

const COLUMNS: [Affiliates; 13] = [
    Affiliates::Id,
    Affiliates::Code,
    Affiliates::BaseRates,
    Affiliates::Tier,
    Affiliates::TierRank,
    Affiliates::LifetimeSales,
    Affiliates::TotalConversions,
    Affiliates::TotalEarned,
    Affiliates::PendingBalance,
    Affiliates::PayoutMethod,
    Affiliates::Active,
    Affiliates::CreatedAt,
    Affiliates::UpdatedAt,
];

pub async fn insert(conn: &mut SqliteConnection, profile: &AffiliateProfile) -> Result<()> {
    let base_rates = serde_json::to_string(&profile.base_rates)
        .map_err(|e| LedgerError::InvalidArgument(format!("unencodable base rates: {e}")))?;

    let query = Query::insert()
        .into_table(Affiliates::Table)
        .columns(COLUMNS)
        .values_panic([
            profile.id.to_string().into(),
            profile.code.clone().into(),
            base_rates.into(),
            profile.tier.as_str().into(),
            i64::from(profile.tier_rank).into(),
            profile.lifetime_sales.cents().into(),
            count_to_i64(profile.total_conversions)?.into(),
            profile.total_earned.cents().into(),
            profile.pending_balance.cents().into(),
            profile.payout_method.as_str().into(),
            i32::from(profile.active).into(),
            timestamp(profile.created_at).into(),
            timestamp(profile.updated_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<AffiliateProfile>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Affiliates::Table)
        .and_where(Expr::col(Affiliates::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

/// Look up by normalized code.
pub async fn find_by_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<AffiliateProfile>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Affiliates::Table)
        .and_where(Expr::col(Affiliates::Code).eq(code))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

/// Credit one sale to the running totals.
///
/// Single statement of column increments, so concurrent sales for the same
/// affiliate cannot lose an update.
pub async fn apply_sale(
    conn: &mut SqliteConnection,
    id: Uuid,
    sale_amount: Money,
    commission: Money,
    now: DateTime<Utc>,
) -> Result<()> {
    let query = Query::update()
        .table(Affiliates::Table)
        .value(
            Affiliates::TotalConversions,
            Expr::col(Affiliates::TotalConversions).add(1),
        )
        .value(
            Affiliates::TotalEarned,
            Expr::col(Affiliates::TotalEarned).add(commission.cents()),
        )
        .value(
            Affiliates::PendingBalance,
            Expr::col(Affiliates::PendingBalance).add(commission.cents()),
        )
        .value(
            Affiliates::LifetimeSales,
            Expr::col(Affiliates::LifetimeSales).add(sale_amount.cents()),
        )
        .value(Affiliates::UpdatedAt, timestamp(now))
        .and_where(Expr::col(Affiliates::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::not_found("affiliate", id));
    }
    Ok(())
}

/// Move the affiliate up to `tier`. Returns false when already at or above it.
pub async fn promote_tier(
    conn: &mut SqliteConnection,
    id: Uuid,
    tier: &TierDefinition,
    now: DateTime<Utc>,
) -> Result<bool> {
    let rank = i64::from(tier.display_order);
    let query = Query::update()
        .table(Affiliates::Table)
        .value(Affiliates::Tier, tier.tier.as_str())
        .value(Affiliates::TierRank, rank)
        .value(Affiliates::UpdatedAt, timestamp(now))
        .and_where(Expr::col(Affiliates::Id).eq(id.to_string()))
        .and_where(Expr::col(Affiliates::TierRank).lt(rank))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    Ok(result.rows_affected() == 1)
}

/// Debit a completed payout. Returns false when the balance cannot cover it.
pub async fn debit_pending(
    conn: &mut SqliteConnection,
    id: Uuid,
    amount: Money,
    now: DateTime<Utc>,
) -> Result<bool> {
    let query = Query::update()
        .table(Affiliates::Table)
        .value(
            Affiliates::PendingBalance,
            Expr::col(Affiliates::PendingBalance).sub(amount.cents()),
        )
        .value(Affiliates::UpdatedAt, timestamp(now))
        .and_where(Expr::col(Affiliates::Id).eq(id.to_string()))
        .and_where(Expr::col(Affiliates::PendingBalance).gte(amount.cents()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_active(
    conn: &mut SqliteConnection,
    id: Uuid,
    active: bool,
    now: DateTime<Utc>,
) -> Result<bool> {
    let query = Query::update()
        .table(Affiliates::Table)
        .value(Affiliates::Active, i32::from(active))
        .value(Affiliates::UpdatedAt, timestamp(now))
        .and_where(Expr::col(Affiliates::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    Ok(result.rows_affected() == 1)
}

fn from_row(row: &SqliteRow) -> Result<AffiliateProfile> {
    let base_rates: String = row.try_get("base_rates")?;
    let base_rates: BTreeMap<String, Decimal> = serde_json::from_str(&base_rates)
        .map_err(|e| LedgerError::Decode(format!("invalid base rates: {e}")))?;
    let tier: String = row.try_get("tier")?;
    let tier_rank: i64 = row.try_get("tier_rank")?;
    let payout_method: String = row.try_get("payout_method")?;

    Ok(AffiliateProfile {
        id: get_uuid(row, "id")?,
        code: row.try_get("code")?,
        base_rates,
        tier: tier.parse().map_err(|_| LedgerError::Decode(format!("unknown tier: {tier}")))?,
        tier_rank: u32::try_from(tier_rank)
            .map_err(|_| LedgerError::Decode(format!("invalid tier rank: {tier_rank}")))?,
        lifetime_sales: get_money(row, "lifetime_sales")?,
        total_conversions: get_count(row, "total_conversions")?,
        total_earned: get_money(row, "total_earned")?,
        pending_balance: get_money(row, "pending_balance")?,
        payout_method: payout_method.parse().map_err(|_| {
            LedgerError::Decode(format!("unknown payout method: {payout_method}"))
        })?,
        active: row.try_get("active")?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

fn count_to_i64(count: u64) -> Result<i64> {
    i64::try_from(count).map_err(|_| LedgerError::InvalidArgument(format!("count overflow: {count}")))
}
