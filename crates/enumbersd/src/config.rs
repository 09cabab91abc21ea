//! Environment configuration for the daemon
//!
//! Every setting comes from an `ENUMBERS_*` environment variable. Values are
//! parsed in `from_env` and checked in `validate`, which fails with a message
//! telling the operator what to set.

use anyhow::{Context, Result};
use enumbers_core::config::{
    CatalogConfig, DEFAULT_RECONCILE_INTERVAL_SECS, SchedulerConfig, ServiceConfig, StorageConfig,
};
use std::env;
use std::net::SocketAddr;
use tracing::Level;

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Default data file
pub const DEFAULT_DATA_PATH: &str = "enumbers.json";

/// Allowed reconciliation interval: one minute to one week
const RECONCILE_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 60..=604_800;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub store_type: String,
    pub data_path: String,
    pub bind_addr: String,
    pub additives_url: Option<String>,
    pub product_url: Option<String>,
    pub user_agent: Option<String>,
    pub scheduler_enabled: bool,
    pub reconcile_interval_secs: u64,
    pub reconcile_on_start: bool,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable if it is set
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            store_type: var("ENUMBERS_STORE_TYPE").unwrap_or_else(|| "file".to_string()),
            data_path: lookup("ENUMBERS_DATA_PATH").unwrap_or_else(|| DEFAULT_DATA_PATH.to_string()),
            bind_addr: var("ENUMBERS_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            additives_url: var("ENUMBERS_ADDITIVES_URL"),
            product_url: var("ENUMBERS_PRODUCT_URL"),
            user_agent: var("ENUMBERS_USER_AGENT"),
            scheduler_enabled: var("ENUMBERS_SCHEDULER_ENABLED")
                .map(|v| parse_flag("ENUMBERS_SCHEDULER_ENABLED", &v))
                .transpose()?
                .unwrap_or(true),
            reconcile_interval_secs: var("ENUMBERS_RECONCILE_INTERVAL_SECS")
                .map(|v| {
                    v.trim().parse::<u64>().with_context(|| {
                        format!(
                            "ENUMBERS_RECONCILE_INTERVAL_SECS must be a number of seconds. Got: '{}'",
                            v
                        )
                    })
                })
                .transpose()?
                .unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECS),
            reconcile_on_start: var("ENUMBERS_RECONCILE_ON_START")
                .map(|v| parse_flag("ENUMBERS_RECONCILE_ON_START", &v))
                .transpose()?
                .unwrap_or(false),
            log_level: var("ENUMBERS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "ENUMBERS_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if self.store_type == "file" && self.data_path.trim().is_empty() {
            anyhow::bail!(
                "ENUMBERS_DATA_PATH cannot be empty when ENUMBERS_STORE_TYPE=file. \
                Set it via: export ENUMBERS_DATA_PATH=/var/lib/enumbers/enumbers.json"
            );
        }

        self.socket_addr()?;

        for (key, url) in [
            ("ENUMBERS_ADDITIVES_URL", &self.additives_url),
            ("ENUMBERS_PRODUCT_URL", &self.product_url),
        ] {
            if let Some(url) = url
                && !url.starts_with("https://")
                && !url.starts_with("http://")
            {
                anyhow::bail!("{} must use HTTP or HTTPS scheme. Got: {}", key, url);
            }
        }

        if self.scheduler_enabled
            && !RECONCILE_INTERVAL_RANGE.contains(&self.reconcile_interval_secs)
        {
            anyhow::bail!(
                "ENUMBERS_RECONCILE_INTERVAL_SECS must be between {} and {} seconds. Got: {}",
                RECONCILE_INTERVAL_RANGE.start(),
                RECONCILE_INTERVAL_RANGE.end(),
                self.reconcile_interval_secs
            );
        }

        self.log_level()?;

        // Catch anything the library rejects with its own wording
        self.service_config()
            .validate()
            .context("Invalid service configuration")?;

        Ok(())
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr.parse::<SocketAddr>().with_context(|| {
            format!(
                "ENUMBERS_BIND_ADDR '{}' is not a valid address. Example: 0.0.0.0:5000",
                self.bind_addr
            )
        })
    }

    /// Parsed log level
    pub fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "ENUMBERS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Library configuration built from these settings
    pub fn service_config(&self) -> ServiceConfig {
        let storage = match self.store_type.as_str() {
            "memory" => StorageConfig::Memory,
            _ => StorageConfig::File {
                path: self.data_path.clone(),
            },
        };

        let mut catalog = CatalogConfig::default();
        if let Some(url) = &self.additives_url {
            catalog.additives_url = url.clone();
        }
        if let Some(url) = &self.product_url {
            catalog.product_url = url.clone();
        }
        if let Some(user_agent) = &self.user_agent {
            catalog.user_agent = user_agent.clone();
        }

        let scheduler = SchedulerConfig {
            enabled: self.scheduler_enabled,
            interval_secs: self.reconcile_interval_secs,
            run_on_start: self.reconcile_on_start,
            ..SchedulerConfig::default()
        };

        ServiceConfig {
            storage,
            catalog,
            scheduler,
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: '{}'", key, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        config.validate().unwrap();

        assert_eq!(config.store_type, "file");
        assert_eq!(config.data_path, "enumbers.json");
        assert_eq!(config.socket_addr().unwrap().port(), 5000);
        assert!(config.scheduler_enabled);
        assert!(!config.reconcile_on_start);
        assert_eq!(config.log_level().unwrap(), Level::INFO);

        let service = config.service_config();
        assert_eq!(service.scheduler.interval_secs, 86_400);
        assert!(matches!(
            service.storage,
            StorageConfig::File { ref path } if path == "enumbers.json"
        ));
    }

    #[test]
    fn test_overrides_reach_service_config() {
        let config = config_from(&[
            ("ENUMBERS_STORE_TYPE", "memory"),
            ("ENUMBERS_PRODUCT_URL", "http://localhost:9000/product"),
            ("ENUMBERS_USER_AGENT", "enumbers-test/1.0"),
            ("ENUMBERS_RECONCILE_INTERVAL_SECS", "3600"),
            ("ENUMBERS_RECONCILE_ON_START", "yes"),
            ("ENUMBERS_SCHEDULER_ENABLED", "false"),
        ])
        .unwrap();
        config.validate().unwrap();

        let service = config.service_config();
        assert!(matches!(service.storage, StorageConfig::Memory));
        assert_eq!(service.catalog.product_url, "http://localhost:9000/product");
        assert_eq!(service.catalog.user_agent, "enumbers-test/1.0");
        assert_eq!(
            service.catalog.additives_url,
            "https://world.openfoodfacts.org/additives.json"
        );
        assert_eq!(service.scheduler.interval_secs, 3600);
        assert!(service.scheduler.run_on_start);
        assert!(!service.scheduler.enabled);
    }

    #[test]
    fn test_unparseable_values_fail_on_load() {
        assert!(config_from(&[("ENUMBERS_RECONCILE_INTERVAL_SECS", "daily")]).is_err());
        assert!(config_from(&[("ENUMBERS_SCHEDULER_ENABLED", "maybe")]).is_err());
    }

    #[test]
    fn test_validation_failures() {
        let cases: &[(&str, &str)] = &[
            ("ENUMBERS_STORE_TYPE", "sqlite"),
            ("ENUMBERS_BIND_ADDR", "localhost"),
            ("ENUMBERS_ADDITIVES_URL", "ftp://example.com/additives.json"),
            ("ENUMBERS_RECONCILE_INTERVAL_SECS", "10"),
            ("ENUMBERS_RECONCILE_INTERVAL_SECS", "1000000"),
            ("ENUMBERS_LOG_LEVEL", "verbose"),
        ];

        for &(key, value) in cases {
            let config = config_from(&[(key, value)]).unwrap();
            let err = config.validate().unwrap_err();
            assert!(
                err.to_string().contains(key),
                "error for {}={} should name the variable, got: {}",
                key,
                value,
                err
            );
        }
    }

    #[test]
    fn test_empty_data_path_rejected_for_file_store() {
        let config = config_from(&[("ENUMBERS_DATA_PATH", "")]).unwrap();
        assert!(config.validate().is_err());

        let memory = config_from(&[("ENUMBERS_STORE_TYPE", "memory"), ("ENUMBERS_DATA_PATH", "")])
            .unwrap();
        assert!(memory.validate().is_ok());
    }

    #[test]
    fn test_interval_ignored_when_scheduler_disabled() {
        let config = config_from(&[
            ("ENUMBERS_SCHEDULER_ENABLED", "0"),
            ("ENUMBERS_RECONCILE_INTERVAL_SECS", "5"),
        ])
        .unwrap();
        assert!(config.validate().is_ok());
    }
}
