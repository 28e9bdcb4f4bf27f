//! Configuration Loader
//!
//! Environment-aware loading: a base YAML file, an optional per-environment
//! overlay, then environment variable overrides.

use super::{ConfigResult, PersistenceConfig};
use ::config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "EXECUTION_CACHE";

const CONFIG_FILE_STEM: &str = "execution_cache";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `./config` with environment auto-detection
    pub fn load() -> ConfigResult<PersistenceConfig> {
        Self::load_from_directory(Path::new("config"), &Self::detect_environment())
    }

    /// Load from a configuration directory for an explicit environment
    pub fn load_from_directory(directory: &Path, environment: &str) -> ConfigResult<PersistenceConfig> {
        let files = [
            directory.join(format!("{CONFIG_FILE_STEM}.yaml")),
            directory.join(format!("{CONFIG_FILE_STEM}.{environment}.yaml")),
        ];
        Self::load_from_sources(&files, None)
    }

    /// Load from optional files (later files win) and environment overrides.
    ///
    /// `environment_overrides` replaces the process environment, which keeps
    /// tests independent of the variables set around them.
    pub fn load_from_sources(
        files: &[PathBuf],
        environment_overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<PersistenceConfig> {
        let mut builder = Config::builder();
        for file in files {
            debug!(path = %file.display(), exists = file.exists(), "Configuration file source");
            builder = builder.add_source(File::from(file.as_path()).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(environment_overrides),
        );

        let config: PersistenceConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        config.log_configuration();
        Ok(config)
    }

    /// Environment name used to pick the overlay file
    pub fn detect_environment() -> String {
        env::var("EXECUTION_CACHE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::load_from_sources(
            &[dir.path().join("absent.yaml")],
            Some(HashMap::new()),
        )
        .unwrap();
        assert_eq!(config, PersistenceConfig::default());
    }

    #[test]
    fn test_environment_overlay_wins_over_base_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("execution_cache.yaml"),
            "eagerly_fetch_execution_tree: false\nprocess_instance_variables_limit: 500\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("execution_cache.test.yaml"),
            "eagerly_fetch_execution_tree: true\n",
        )
        .unwrap();

        let files = [
            dir.path().join("execution_cache.yaml"),
            dir.path().join("execution_cache.test.yaml"),
        ];
        let config = ConfigLoader::load_from_sources(&files, Some(HashMap::new())).unwrap();
        assert!(config.eagerly_fetch_execution_tree);
        assert_eq!(config.process_instance_variables_limit, 500);
    }
}
