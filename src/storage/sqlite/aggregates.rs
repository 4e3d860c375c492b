//! Monthly commission rollups.

use chrono::{DateTime, Utc};
use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::error::Result;
use crate::model::MonthlyCommissionAggregate;
use crate::money::Money;
use crate::storage::helpers::{get_count, get_money, get_uuid, timestamp};
use crate::storage::schema::MonthlyAggregates;

/// Add one sale to the (affiliate, year, month) row, creating it if absent.
pub async fn record_sale(
    conn: &mut SqliteConnection,
    affiliate_id: Uuid,
    year: i32,
    month: u32,
    sale_amount: Money,
    commission: Money,
    now: DateTime<Utc>,
) -> Result<()> {
    let query = Query::insert()
        .into_table(MonthlyAggregates::Table)
        .columns([
            MonthlyAggregates::AffiliateId,
            MonthlyAggregates::Year,
            MonthlyAggregates::Month,
            MonthlyAggregates::SaleCount,
            MonthlyAggregates::SaleAmount,
            MonthlyAggregates::CommissionEarned,
            MonthlyAggregates::CommissionPending,
            MonthlyAggregates::UpdatedAt,
        ])
        .values_panic([
            affiliate_id.to_string().into(),
            year.into(),
            month.into(),
            1i64.into(),
            sale_amount.cents().into(),
            commission.cents().into(),
            commission.cents().into(),
            timestamp(now).into(),
        ])
        .on_conflict(
            OnConflict::columns([
                MonthlyAggregates::AffiliateId,
                MonthlyAggregates::Year,
                MonthlyAggregates::Month,
            ])
            .value(
                MonthlyAggregates::SaleCount,
                Expr::col(MonthlyAggregates::SaleCount).add(1),
            )
            .value(
                MonthlyAggregates::SaleAmount,
                Expr::col(MonthlyAggregates::SaleAmount).add(sale_amount.cents()),
            )
            .value(
                MonthlyAggregates::CommissionEarned,
                Expr::col(MonthlyAggregates::CommissionEarned).add(commission.cents()),
            )
            .value(
                MonthlyAggregates::CommissionPending,
                Expr::col(MonthlyAggregates::CommissionPending).add(commission.cents()),
            )
            .update_columns([MonthlyAggregates::UpdatedAt])
            .to_owned(),
        )
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

/// Move paid-out commission out of the month's pending column.
pub async fn settle(
    conn: &mut SqliteConnection,
    affiliate_id: Uuid,
    year: i32,
    month: u32,
    commission: Money,
    now: DateTime<Utc>,
) -> Result<()> {
    let query = Query::update()
        .table(MonthlyAggregates::Table)
        .value(
            MonthlyAggregates::CommissionPending,
            Expr::col(MonthlyAggregates::CommissionPending).sub(commission.cents()),
        )
        .value(MonthlyAggregates::UpdatedAt, timestamp(now))
        .and_where(Expr::col(MonthlyAggregates::AffiliateId).eq(affiliate_id.to_string()))
        .and_where(Expr::col(MonthlyAggregates::Year).eq(year))
        .and_where(Expr::col(MonthlyAggregates::Month).eq(month))
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub async fn get(
    conn: &mut SqliteConnection,
    affiliate_id: Uuid,
    year: i32,
    month: u32,
) -> Result<Option<MonthlyCommissionAggregate>> {
    let query = Query::select()
        .columns([
            MonthlyAggregates::AffiliateId,
            MonthlyAggregates::Year,
            MonthlyAggregates::Month,
            MonthlyAggregates::SaleCount,
            MonthlyAggregates::SaleAmount,
            MonthlyAggregates::CommissionEarned,
            MonthlyAggregates::CommissionPending,
        ])
        .from(MonthlyAggregates::Table)
        .and_where(Expr::col(MonthlyAggregates::AffiliateId).eq(affiliate_id.to_string()))
        .and_where(Expr::col(MonthlyAggregates::Year).eq(year))
        .and_where(Expr::col(MonthlyAggregates::Month).eq(month))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

fn from_row(row: &SqliteRow) -> Result<MonthlyCommissionAggregate> {
    let month: i64 = row.try_get("month")?;
    Ok(MonthlyCommissionAggregate {
        affiliate_id: get_uuid(row, "affiliate_id")?,
        year: row.try_get("year")?,
        month: month as u32,
        sale_count: get_count(row, "sale_count")?,
        sale_amount: get_money(row, "sale_amount")?,
        commission_earned: get_money(row, "commission_earned")?,
        commission_pending: get_money(row, "commission_pending")?,
    })
}
