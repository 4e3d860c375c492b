//! Shared storage helper functions.
//!
//! Timestamp encoding, identifier parsing and transaction bracketing used
//! across the SQLite repositories.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::warn;
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::money::Money;

/// Encode a timestamp as fixed-width RFC3339 (microseconds, `Z` suffix) so
/// that lexicographic order in TEXT columns matches chronological order.
pub fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::Decode(format!("invalid timestamp '{raw}': {e}")))
}

pub fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| LedgerError::Decode(format!("invalid uuid '{raw}': {e}")))
}

pub fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| LedgerError::Decode(format!("invalid decimal '{raw}': {e}")))
}

pub fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.try_get(column)?;
    parse_uuid(&raw)
}

pub fn get_opt_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.as_deref().map(parse_uuid).transpose()
}

pub fn get_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    parse_timestamp(&raw)
}

pub fn get_opt_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.as_deref().map(parse_timestamp).transpose()
}

pub fn get_money(row: &SqliteRow, column: &str) -> Result<Money> {
    let cents: i64 = row.try_get(column)?;
    Ok(Money::from_cents(cents))
}

pub fn get_count(row: &SqliteRow, column: &str) -> Result<u64> {
    let count: i64 = row.try_get(column)?;
    u64::try_from(count).map_err(|_| LedgerError::Decode(format!("negative {column}: {count}")))
}

/// Write transaction owning its pooled connection.
///
/// Dropping it before [`finish`] queues a ROLLBACK that runs before the
/// connection is handed out again, so a cancelled caller cannot leave the
/// write lock held.
pub type WriteTx = Transaction<'static, Sqlite>;

/// Start a write transaction.
///
/// BEGIN IMMEDIATE acquires the write lock upfront, preventing deadlocks
/// when concurrent DEFERRED transactions race to upgrade from shared to exclusive.
pub async fn begin_immediate(pool: &SqlitePool) -> Result<WriteTx> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Commit on success, roll back on failure. No partial state survives an error.
pub async fn finish<T>(tx: WriteTx, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let fractional = whole + chrono::Duration::milliseconds(500);
        let a = timestamp(whole);
        let b = timestamp(fractional);
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(a, "2026-03-01T12:00:00.000000Z");
    }

    #[test]
    fn test_timestamp_round_trip() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 15, 8, 30, 5).unwrap();
        assert_eq!(parse_timestamp(&timestamp(ts)).unwrap(), ts);
    }

    #[test]
    fn test_parse_errors_are_decode_errors() {
        assert!(matches!(parse_uuid("nope"), Err(LedgerError::Decode(_))));
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(LedgerError::Decode(_))
        ));
        assert!(matches!(parse_decimal("1.2.3"), Err(LedgerError::Decode(_))));
    }
}
