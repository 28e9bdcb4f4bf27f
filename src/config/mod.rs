//! # Execution Cache Configuration
//!
//! Settings for the data manager and the PostgreSQL store.
//!
//! ## Sources
//!
//! Loaded by [`ConfigLoader`] in increasing priority:
//!
//! 1. Built-in defaults ([`PersistenceConfig::default`])
//! 2. `execution_cache.yaml` in the configuration directory (optional)
//! 3. `execution_cache.{environment}.yaml` overrides (optional)
//! 4. `EXECUTION_CACHE__*` environment variables, nested keys separated by
//!    `__` (for example `EXECUTION_CACHE__DATABASE__MAX_CONNECTIONS=20`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use execution_cache::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load()?;
//! assert!(config.process_instance_variables_limit > 0);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::PROCESS_INSTANCE_VARIABLES_LIMIT;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Data manager behavior and store connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Fetch a whole execution tree on the first lookup of any of its executions
    pub eagerly_fetch_execution_tree: bool,
    /// Rows fetched by the process-instances-with-variables query before
    /// in-memory pagination
    pub process_instance_variables_limit: usize,
    pub database: DatabaseConfig,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            eagerly_fetch_execution_tree: false,
            process_instance_variables_limit: PROCESS_INSTANCE_VARIABLES_LIMIT,
            database: DatabaseConfig::default(),
        }
    }
}

impl PersistenceConfig {
    /// Reject values the data manager or the store cannot work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.process_instance_variables_limit == 0 {
            return Err(ConfigurationError::invalid(
                "process_instance_variables_limit",
                "must be greater than zero",
            ));
        }
        if i64::try_from(self.process_instance_variables_limit).is_err() {
            return Err(ConfigurationError::invalid(
                "process_instance_variables_limit",
                "does not fit a 64-bit signed row count",
            ));
        }
        self.database.validate()
    }

    pub fn log_configuration(&self) {
        info!(
            eagerly_fetch_execution_tree = self.eagerly_fetch_execution_tree,
            process_instance_variables_limit = self.process_instance_variables_limit,
            database_url = %self.database.sanitized_url(),
            max_connections = self.database.max_connections,
            acquire_timeout_seconds = self.database.acquire_timeout_seconds,
            "Execution cache configuration"
        );
    }
}

/// PostgreSQL pool settings; the store is only connected when `url` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_connections == 0 {
            return Err(ConfigurationError::invalid(
                "database.max_connections",
                "must be greater than zero",
            ));
        }
        if self.acquire_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid(
                "database.acquire_timeout_seconds",
                "must be greater than zero",
            ));
        }
        if let Some(url) = &self.url {
            if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
                return Err(ConfigurationError::invalid(
                    "database.url",
                    "must use the postgres:// or postgresql:// scheme",
                ));
            }
        }
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    /// The URL with any password masked, for logs
    pub fn sanitized_url(&self) -> String {
        let Some(url) = &self.url else {
            return "<unset>".to_string();
        };
        match (url.find("://"), url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                let credentials = &url[scheme_end + 3..at];
                match credentials.find(':') {
                    Some(colon) => format!(
                        "{}{}:***{}",
                        &url[..scheme_end + 3],
                        &credentials[..colon],
                        &url[at..]
                    ),
                    None => url.clone(),
                }
            }
            _ => url.clone(),
        }
    }
}
