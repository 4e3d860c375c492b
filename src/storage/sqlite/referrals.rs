//! Referral clicks and their single conversion.

use chrono::{DateTime, Utc};
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::error::Result;
use crate::model::Referral;
use crate::storage::helpers::{get_opt_uuid, get_timestamp, get_uuid, timestamp};
use crate::storage::schema::Referrals;

const COLUMNS: [Referrals; 5] = [
    Referrals::Id,
    Referrals::AffiliateId,
    Referrals::CreatedAt,
    Referrals::Converted,
    Referrals::SaleId,
];

pub async fn insert(conn: &mut SqliteConnection, referral: &Referral) -> Result<()> {
    let query = Query::insert()
        .into_table(Referrals::Table)
        .columns(COLUMNS)
        .values_panic([
            referral.id.to_string().into(),
            referral.affiliate_id.to_string().into(),
            timestamp(referral.created_at).into(),
            i32::from(referral.converted).into(),
            referral.sale_id.map(|id| id.to_string()).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Referral>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Referrals::Table)
        .and_where(Expr::col(Referrals::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

/// Most recently clicked unconverted referral with `from <= created_at <= until`.
pub async fn latest_unconverted(
    conn: &mut SqliteConnection,
    affiliate_id: Uuid,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Option<Referral>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Referrals::Table)
        .and_where(Expr::col(Referrals::AffiliateId).eq(affiliate_id.to_string()))
        .and_where(Expr::col(Referrals::Converted).eq(0))
        .and_where(Expr::col(Referrals::CreatedAt).gte(timestamp(from)))
        .and_where(Expr::col(Referrals::CreatedAt).lte(timestamp(until)))
        .order_by(Referrals::CreatedAt, Order::Desc)
        .order_by(Referrals::Id, Order::Desc)
        .limit(1)
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

/// Mark a referral converted by `sale_id`.
///
/// Conditional on `converted = 0`: only the first claimant wins. Returns
/// false when the referral was already converted.
pub async fn claim(conn: &mut SqliteConnection, referral_id: Uuid, sale_id: Uuid) -> Result<bool> {
    let query = Query::update()
        .table(Referrals::Table)
        .value(Referrals::Converted, 1)
        .value(Referrals::SaleId, sale_id.to_string())
        .and_where(Expr::col(Referrals::Id).eq(referral_id.to_string()))
        .and_where(Expr::col(Referrals::Converted).eq(0))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    Ok(result.rows_affected() == 1)
}

fn from_row(row: &SqliteRow) -> Result<Referral> {
    Ok(Referral {
        id: get_uuid(row, "id")?,
        affiliate_id: get_uuid(row, "affiliate_id")?,
        created_at: get_timestamp(row, "created_at")?,
        converted: row.try_get("converted")?,
        sale_id: get_opt_uuid(row, "sale_id")?,
    })
}
