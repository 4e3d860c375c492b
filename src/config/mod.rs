//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod policy;
mod server;
mod storage;

pub use policy::{
    AttributionConfig, PayoutConfig, RetryConfig, DEFAULT_ATTRIBUTION_WINDOW_HOURS,
    DEFAULT_MINIMUM_PAYOUT_CENTS,
};
pub use server::{ServerConfig, DEFAULT_PORT};
pub use storage::{StorageConfig, IN_MEMORY_PATH};

use serde::Deserialize;

use crate::error::{LedgerError, Result};
use crate::model::{standard_products, ProductCatalog, ProductDefinition};
use crate::tier::{standard_tiers, TierCatalog, TierDefinition};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "AFFILIATE_LEDGER_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "AFFILIATE_LEDGER";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "AFFILIATE_LEDGER_LOG";

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Payout gating.
    pub payout: PayoutConfig,
    /// Referral attribution window.
    pub attribution: AttributionConfig,
    /// Retry policy for contended writes.
    pub retry: RetryConfig,
    /// Tier catalog. Replaces the built-in catalog entirely when set.
    pub tiers: Vec<TierDefinition>,
    /// Product catalog. Replaces the built-in catalog entirely when set.
    pub products: Vec<ProductDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            payout: PayoutConfig::default(),
            attribution: AttributionConfig::default(),
            retry: RetryConfig::default(),
            tiers: standard_tiers(),
            products: standard_products(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| LedgerError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Parse a YAML document directly, without file or environment layering.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Create config for testing: in-memory storage and standard catalogs.
    pub fn for_test() -> Self {
        Self {
            storage: StorageConfig::in_memory(),
            ..Self::default()
        }
    }

    pub fn tier_catalog(&self) -> Result<TierCatalog> {
        TierCatalog::new(self.tiers.clone())
    }

    pub fn product_catalog(&self) -> Result<ProductCatalog> {
        ProductCatalog::new(self.products.clone())
    }
}
