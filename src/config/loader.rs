//! Configuration Loader
//!
//! Environment-aware configuration loading built on the `config` crate.
//! Handles source layering, environment detection and validation.

use super::error::{ConfigResult, ConfigurationError};
use super::{DeploymentEnvironment, ResilienceConfig};
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE: &str = "resilience.yaml";
const ENV_PREFIX: &str = "RESILIENCE";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: ResilienceConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));
        if !config_directory.is_dir() {
            return Err(ConfigurationError::DirectoryNotFound {
                path: config_directory,
            });
        }

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading resilience configuration"
        );

        let config = Self::build_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            max_retries = config.boundary.max_retries,
            max_attempts = config.views.max_attempts,
            eager_views = config.preload.eager.len(),
            routes = config.routes.len(),
            "Resilience configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an in-memory configuration, validating it first
    pub fn from_config(config: ResilienceConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            environment: config.environment.to_string(),
            config,
            config_directory: PathBuf::from("config"),
        }))
    }

    fn build_config(directory: &Path, environment: &str) -> ConfigResult<ResilienceConfig> {
        let base = directory.join(BASE_FILE);
        let overrides = directory.join(format!("resilience.{environment}.yaml"));
        let deployment = DeploymentEnvironment::from_name(environment);

        Config::builder()
            .add_source(File::new(&base.to_string_lossy(), FileFormat::Yaml).required(false))
            .add_source(File::new(&overrides.to_string_lossy(), FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override("environment", deployment.to_string())
            .map_err(|e| ConfigurationError::load_error(environment, e))?
            .build()
            .map_err(|e| ConfigurationError::load_error(environment, e))?
            .try_deserialize::<ResilienceConfig>()
            .map_err(|e| ConfigurationError::load_error(environment, e))
    }

    /// Current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("RESILIENCE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }
}
