//! Sales and commission status transitions.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::model::{CommissionStatus, Sale};
use crate::storage::helpers::{
    get_money, get_opt_uuid, get_timestamp, get_uuid, parse_decimal, timestamp,
};
use crate::storage::schema::Sales;

const COLUMNS: [Sales; 14] = [
    Sales::Id,
    Sales::AffiliateId,
    Sales::ReferralId,
    Sales::ProductId,
    Sales::PlanName,
    Sales::SaleAmount,
    Sales::CommissionRate,
    Sales::Commission,
    Sales::CommissionStatus,
    Sales::TransactionRef,
    Sales::CustomerRef,
    Sales::SubscriptionRef,
    Sales::Metadata,
    Sales::CreatedAt,
];

pub async fn insert(conn: &mut SqliteConnection, sale: &Sale) -> Result<()> {
    let metadata = sale
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| LedgerError::InvalidArgument(format!("unencodable metadata: {e}")))?;

    let query = Query::insert()
        .into_table(Sales::Table)
        .columns(COLUMNS)
        .values_panic([
            sale.id.to_string().into(),
            sale.affiliate_id.to_string().into(),
            sale.referral_id.map(|id| id.to_string()).into(),
            sale.product_id.clone().into(),
            sale.plan_name.clone().into(),
            sale.sale_amount.cents().into(),
            sale.commission_rate.to_string().into(),
            sale.commission.cents().into(),
            sale.status.as_str().into(),
            sale.transaction_ref.clone().into(),
            sale.customer_ref.clone().into(),
            sale.subscription_ref.clone().into(),
            metadata.into(),
            timestamp(sale.created_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Sale>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Sales::Table)
        .and_where(Expr::col(Sales::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

/// Idempotency lookup by external transaction reference.
pub async fn find_by_transaction(
    conn: &mut SqliteConnection,
    transaction_ref: &str,
) -> Result<Option<Sale>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Sales::Table)
        .and_where(Expr::col(Sales::TransactionRef).eq(transaction_ref))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn link_referral(
    conn: &mut SqliteConnection,
    sale_id: Uuid,
    referral_id: Uuid,
) -> Result<()> {
    let query = Query::update()
        .table(Sales::Table)
        .value(Sales::ReferralId, referral_id.to_string())
        .and_where(Expr::col(Sales::Id).eq(sale_id.to_string()))
        .and_where(Expr::col(Sales::ReferralId).is_null())
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::InvariantViolation(format!(
            "sale {sale_id} is already linked to a referral"
        )));
    }
    Ok(())
}

/// Move a sale's commission status along the transition table.
///
/// The write is conditional on the current status being `from`; returns
/// false when another writer already moved it.
pub async fn transition(
    conn: &mut SqliteConnection,
    sale_id: Uuid,
    from: CommissionStatus,
    to: CommissionStatus,
) -> Result<bool> {
    from.transition_to(to)?;

    let query = Query::update()
        .table(Sales::Table)
        .value(Sales::CommissionStatus, to.as_str())
        .and_where(Expr::col(Sales::Id).eq(sale_id.to_string()))
        .and_where(Expr::col(Sales::CommissionStatus).eq(from.as_str()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    Ok(result.rows_affected() == 1)
}

/// Mark a pending sale payable and stamp its position in the affiliate's
/// ledger order. Returns false when another writer already applied it.
///
/// Must run inside a write transaction so the sequence read and the update
/// see the same state.
pub async fn mark_payable(conn: &mut SqliteConnection, sale: &Sale) -> Result<bool> {
    CommissionStatus::Pending.transition_to(CommissionStatus::Payable)?;

    let last = Query::select()
        .expr(Expr::col(Sales::LedgerSeq).max())
        .from(Sales::Table)
        .and_where(Expr::col(Sales::AffiliateId).eq(sale.affiliate_id.to_string()))
        .to_string(SqliteQueryBuilder);
    let row = sqlx::query(&last).fetch_one(&mut *conn).await?;
    let last: Option<i64> = row.try_get(0)?;

    let query = Query::update()
        .table(Sales::Table)
        .value(Sales::CommissionStatus, CommissionStatus::Payable.as_str())
        .value(Sales::LedgerSeq, last.unwrap_or(0) + 1)
        .and_where(Expr::col(Sales::Id).eq(sale.id.to_string()))
        .and_where(Expr::col(Sales::CommissionStatus).eq(CommissionStatus::Pending.as_str()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    Ok(result.rows_affected() == 1)
}

/// Sales of an affiliate in a given status, in ledger-application order.
/// Pending sales have no position yet and fall back to creation order.
pub async fn list_by_status(
    conn: &mut SqliteConnection,
    affiliate_id: Uuid,
    status: CommissionStatus,
) -> Result<Vec<Sale>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Sales::Table)
        .and_where(Expr::col(Sales::AffiliateId).eq(affiliate_id.to_string()))
        .and_where(Expr::col(Sales::CommissionStatus).eq(status.as_str()))
        .order_by(Sales::LedgerSeq, Order::Asc)
        .order_by(Sales::CreatedAt, Order::Asc)
        .order_by(Sales::Id, Order::Asc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows.iter().map(from_row).collect()
}

/// Number of sales recorded for an affiliate.
pub async fn count_for_affiliate(conn: &mut SqliteConnection, affiliate_id: Uuid) -> Result<u64> {
    let query = Query::select()
        .expr(Expr::col(Sales::Id).count())
        .from(Sales::Table)
        .and_where(Expr::col(Sales::AffiliateId).eq(affiliate_id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
    let count: i64 = row.try_get(0)?;
    Ok(count.max(0) as u64)
}

fn from_row(row: &SqliteRow) -> Result<Sale> {
    let rate: String = row.try_get("commission_rate")?;
    let status: String = row.try_get("commission_status")?;
    let metadata: Option<String> = row.try_get("metadata")?;
    let metadata = metadata
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| LedgerError::Decode(format!("invalid sale metadata: {e}")))?;

    Ok(Sale {
        id: get_uuid(row, "id")?,
        affiliate_id: get_uuid(row, "affiliate_id")?,
        referral_id: get_opt_uuid(row, "referral_id")?,
        product_id: row.try_get("product_id")?,
        plan_name: row.try_get("plan_name")?,
        sale_amount: get_money(row, "sale_amount")?,
        commission_rate: parse_decimal(&rate)?,
        commission: get_money(row, "commission")?,
        status: status.parse()?,
        transaction_ref: row.try_get("transaction_ref")?,
        customer_ref: row.try_get("customer_ref")?,
        subscription_ref: row.try_get("subscription_ref")?,
        metadata,
        created_at: get_timestamp(row, "created_at")?,
    })
}
