//! Payout requests.

use chrono::{DateTime, Utc};
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::model::{PayoutRequest, PayoutStatus};
use crate::money::Money;
use crate::storage::helpers::{get_money, get_opt_timestamp, get_timestamp, get_uuid, timestamp};
use crate::storage::schema::PayoutRequests;

const COLUMNS: [PayoutRequests; 9] = [
    PayoutRequests::Id,
    PayoutRequests::AffiliateId,
    PayoutRequests::Amount,
    PayoutRequests::Method,
    PayoutRequests::Status,
    PayoutRequests::RejectionReason,
    PayoutRequests::RequestedAt,
    PayoutRequests::ProcessedAt,
    PayoutRequests::CompletedAt,
];

pub async fn insert(conn: &mut SqliteConnection, request: &PayoutRequest) -> Result<()> {
    let query = Query::insert()
        .into_table(PayoutRequests::Table)
        .columns(COLUMNS)
        .values_panic([
            request.id.to_string().into(),
            request.affiliate_id.to_string().into(),
            request.amount.cents().into(),
            request.method.as_str().into(),
            request.status.as_str().into(),
            request.rejection_reason.clone().into(),
            timestamp(request.requested_at).into(),
            request.processed_at.map(timestamp).into(),
            request.completed_at.map(timestamp).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<PayoutRequest>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(PayoutRequests::Table)
        .and_where(Expr::col(PayoutRequests::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

/// Payout requests of an affiliate, newest first.
pub async fn list_for_affiliate(
    conn: &mut SqliteConnection,
    affiliate_id: Uuid,
) -> Result<Vec<PayoutRequest>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(PayoutRequests::Table)
        .and_where(Expr::col(PayoutRequests::AffiliateId).eq(affiliate_id.to_string()))
        .order_by(PayoutRequests::RequestedAt, Order::Desc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows.iter().map(from_row).collect()
}

/// Sum of completed payout amounts for an affiliate.
pub async fn completed_total(conn: &mut SqliteConnection, affiliate_id: Uuid) -> Result<Money> {
    let query = Query::select()
        .expr(Expr::col(PayoutRequests::Amount).sum())
        .from(PayoutRequests::Table)
        .and_where(Expr::col(PayoutRequests::AffiliateId).eq(affiliate_id.to_string()))
        .and_where(Expr::col(PayoutRequests::Status).eq(PayoutStatus::Completed.as_str()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
    let total: Option<i64> = row.try_get(0)?;
    Ok(Money::from_cents(total.unwrap_or(0)))
}

/// Apply a decision to a pending request, stamping the processing times.
///
/// Conditional on `status = 'pending'`; fails with `InvalidTransition` when
/// the request has already reached a terminal state.
pub async fn resolve(
    conn: &mut SqliteConnection,
    id: Uuid,
    to: PayoutStatus,
    rejection_reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    PayoutStatus::Pending.transition_to(to)?;

    // The statement is not Send; build the SQL before any await.
    let query = {
        let mut update = Query::update();
        update
            .table(PayoutRequests::Table)
            .value(PayoutRequests::Status, to.as_str())
            .value(PayoutRequests::ProcessedAt, timestamp(now))
            .and_where(Expr::col(PayoutRequests::Id).eq(id.to_string()))
            .and_where(Expr::col(PayoutRequests::Status).eq(PayoutStatus::Pending.as_str()));

        match to {
            PayoutStatus::Completed => {
                update.value(PayoutRequests::CompletedAt, timestamp(now));
            }
            PayoutStatus::Rejected => {
                update.value(
                    PayoutRequests::RejectionReason,
                    rejection_reason.map(str::to_string),
                );
            }
            PayoutStatus::Pending => {}
        }

        update.to_string(SqliteQueryBuilder)
    };
    let result = sqlx::query(&query).execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        let current = get(conn, id)
            .await?
            .map(|r| r.status)
            .ok_or_else(|| LedgerError::not_found("payout request", id))?;
        return Err(LedgerError::InvalidTransition {
            entity: "payout",
            from: current.as_str(),
            to: to.as_str(),
        });
    }
    Ok(())
}

fn from_row(row: &SqliteRow) -> Result<PayoutRequest> {
    let method: String = row.try_get("method")?;
    let status: String = row.try_get("status")?;

    Ok(PayoutRequest {
        id: get_uuid(row, "id")?,
        affiliate_id: get_uuid(row, "affiliate_id")?,
        amount: get_money(row, "amount")?,
        method: method
            .parse()
            .map_err(|_| LedgerError::Decode(format!("unknown payout method: {method}")))?,
        status: status.parse()?,
        rejection_reason: row.try_get("rejection_reason")?,
        requested_at: get_timestamp(row, "requested_at")?,
        processed_at: get_opt_timestamp(row, "processed_at")?,
        completed_at: get_opt_timestamp(row, "completed_at")?,
    })
}
