//! Configuration types for the E-number service
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Default Open Food Facts additive list
pub const DEFAULT_ADDITIVES_URL: &str = "https://world.openfoodfacts.org/additives.json";

/// Default Open Food Facts product endpoint (barcode is appended)
pub const DEFAULT_PRODUCT_URL: &str = "https://world.openfoodfacts.org/api/v0/product";

/// Default reconciliation interval: once a day
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Where the record document lives
    #[serde(default)]
    pub storage: StorageConfig,

    /// External catalog client settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Background reconciliation settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl ServiceConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.storage.validate()?;
        self.catalog.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// JSON document on disk
    File {
        /// Path to the data file
        path: String,
    },

    /// In-memory document (not persistent)
    Memory,
}

impl StorageConfig {
    /// Validate the storage configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StorageConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Data file path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the storage type name
    pub fn type_name(&self) -> &str {
        match self {
            StorageConfig::File { .. } => "file",
            StorageConfig::Memory => "memory",
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::File {
            path: "enumbers.json".to_string(),
        }
    }
}

/// External catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Bulk additive list endpoint
    #[serde(default = "default_additives_url")]
    pub additives_url: String,

    /// Product endpoint base; lookups go to `<product_url>/<barcode>.json`
    #[serde(default = "default_product_url")]
    pub product_url: String,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for the bulk additive list (in seconds)
    #[serde(default = "default_catalog_timeout_secs")]
    pub catalog_timeout_secs: u64,

    /// Timeout for a single product lookup (in seconds)
    #[serde(default = "default_product_timeout_secs")]
    pub product_timeout_secs: u64,
}

impl CatalogConfig {
    /// Validate the catalog configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (label, url) in [
            ("additives URL", &self.additives_url),
            ("product URL", &self.product_url),
        ] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(crate::Error::config(format!(
                    "Catalog {} must use HTTP or HTTPS scheme. Got: '{}'",
                    label, url
                )));
            }
        }
        if self.user_agent.trim().is_empty() {
            return Err(crate::Error::config("Catalog User-Agent cannot be empty"));
        }
        if self.catalog_timeout_secs == 0 || self.product_timeout_secs == 0 {
            return Err(crate::Error::config("Catalog timeouts must be > 0"));
        }
        Ok(())
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            additives_url: default_additives_url(),
            product_url: default_product_url(),
            user_agent: default_user_agent(),
            catalog_timeout_secs: default_catalog_timeout_secs(),
            product_timeout_secs: default_product_timeout_secs(),
        }
    }
}

fn default_additives_url() -> String {
    DEFAULT_ADDITIVES_URL.to_string()
}

fn default_product_url() -> String {
    DEFAULT_PRODUCT_URL.to_string()
}

fn default_user_agent() -> String {
    format!("enumbers/{} (reconciliation job)", env!("CARGO_PKG_VERSION"))
}

fn default_catalog_timeout_secs() -> u64 {
    30
}

fn default_product_timeout_secs() -> u64 {
    10
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the background reconciliation task runs at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Interval between scheduled reconciliations (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Run one reconciliation immediately on start instead of waiting a
    /// full interval
    #[serde(default)]
    pub run_on_start: bool,

    /// Capacity of the scheduler event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SchedulerConfig {
    /// Validate the scheduler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Reconcile interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            run_on_start: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    DEFAULT_RECONCILE_INTERVAL_SECS
}

fn default_event_channel_capacity() -> usize {
    64
}
