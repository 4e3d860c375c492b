//! Storage: SQLite pool setup, schema, and repositories.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::config::StorageConfig;
use crate::error::{LedgerError, Result};

pub mod helpers;
pub mod schema;
pub mod sqlite;

/// Open the configured database, creating the file when missing.
///
/// In-memory databases live and die with their connection, so the pool is
/// pinned to a single connection that is never recycled.
pub async fn connect(config: &StorageConfig) -> Result<SqlitePool> {
    info!(path = %config.path, "Opening ledger database");

    let options = if config.is_in_memory() {
        "sqlite::memory:".parse::<SqliteConnectOptions>()?
    } else {
        if let Some(parent) = std::path::Path::new(&config.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LedgerError::Config(format!(
                        "cannot create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        SqliteConnectOptions::new()
            .filename(&config.path)
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true)
    }
    .busy_timeout(config.busy_timeout())
    .foreign_keys(true);

    let pool = if config.is_in_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?
    };

    Ok(pool)
}

/// Create ledger tables and indexes if they do not exist.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(schema::CREATE_LEDGER_TABLES)
        .execute(pool)
        .await?;
    Ok(())
}

/// Connect and initialize in one step.
pub async fn open(config: &StorageConfig) -> Result<SqlitePool> {
    let pool = connect(config).await?;
    init_schema(&pool).await?;
    Ok(pool)
}
