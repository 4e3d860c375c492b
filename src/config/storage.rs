//! Storage configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Path value selecting a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path, or `:memory:`.
    pub path: String,
    /// Pool size. Forced to 1 for in-memory databases, which are per-connection.
    pub max_connections: u32,
    /// How long a writer waits on a locked database before SQLITE_BUSY.
    pub busy_timeout_ms: u64,
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self {
            path: IN_MEMORY_PATH.to_string(),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY_PATH
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "data/affiliate_ledger.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}
