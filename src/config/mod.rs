//! # Resilience Configuration
//!
//! Layered configuration for boundaries, routed views, preloading and the
//! client context attached to failure reports.
//!
//! ## Sources (later sources win)
//!
//! 1. Built-in defaults
//! 2. `resilience.yaml` in the configuration directory
//! 3. `resilience.<environment>.yaml` in the same directory
//! 4. Environment variables prefixed `RESILIENCE__`, e.g.
//!    `RESILIENCE__BOUNDARY__MAX_RETRIES=5`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use view_resilience::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let max_retries = manager.config().boundary.max_retries;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use crate::constants::{environments, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_RETRIES, MAX_CONFIGURABLE_BUDGET};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Deployment the application runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentEnvironment {
    Development,
    Test,
    Production,
}

impl DeploymentEnvironment {
    /// Map an environment name; anything unrecognised is treated as production
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            environments::DEVELOPMENT => Self::Development,
            environments::TEST => Self::Test,
            _ => Self::Production,
        }
    }

    /// Development builds print failures locally and show raw error details
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl Default for DeploymentEnvironment {
    fn default() -> Self {
        Self::Development
    }
}

impl fmt::Display for DeploymentEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "{}", environments::DEVELOPMENT),
            Self::Test => write!(f, "{}", environments::TEST),
            Self::Production => write!(f, "{}", environments::PRODUCTION),
        }
    }
}

/// Root configuration structure mirroring resilience.yaml
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub environment: DeploymentEnvironment,

    /// Failure boundary retry budget
    pub boundary: BoundarySettings,

    /// Routed view retry budget
    pub views: ViewSettings,

    /// Eager and hover-driven preloading
    pub preload: PreloadSettings,

    /// Path patterns mapped to module identifiers, matched in order
    pub routes: Vec<RouteConfig>,

    /// Context attached to failure reports and used for same-origin checks
    pub client: ClientSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundarySettings {
    pub max_retries: u32,
    /// Delay before a boundary-driven automatic retry; `0` disables it
    pub retry_delay_ms: u64,
}

impl BoundarySettings {
    pub fn retry_delay(&self) -> Option<Duration> {
        (self.retry_delay_ms > 0).then(|| Duration::from_millis(self.retry_delay_ms))
    }
}

impl Default for BoundarySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub max_attempts: u32,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadSettings {
    /// Module identifiers warmed at application start
    pub eager: Vec<String>,
    pub hover_enabled: bool,
}

impl Default for PreloadSettings {
    fn default() -> Self {
        Self {
            eager: Vec::new(),
            hover_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Path pattern, `:name` segments match any single segment
    pub pattern: String,
    pub module: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Scheme, host and optional port, e.g. `https://shop.example.com`
    pub origin: String,
    pub user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            user_agent: format!("view-resilience/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ResilienceConfig {
    /// Validate budgets, origin and route table
    pub fn validate(&self) -> ConfigResult<()> {
        Self::validate_budget("boundary.max_retries", self.boundary.max_retries)?;
        Self::validate_budget("views.max_attempts", self.views.max_attempts)?;

        if self.client.origin.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "client.origin",
                "",
                "origin must not be empty",
            ));
        }

        let mut patterns = HashSet::new();
        for route in &self.routes {
            if !route.pattern.starts_with('/') {
                return Err(ConfigurationError::invalid_value(
                    "routes.pattern",
                    &route.pattern,
                    "patterns must start with '/'",
                ));
            }
            if route.module.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "routes.module",
                    &route.pattern,
                    "route has no module identifier",
                ));
            }
            if !patterns.insert(route.pattern.as_str()) {
                return Err(ConfigurationError::invalid_value(
                    "routes.pattern",
                    &route.pattern,
                    "duplicate route pattern",
                ));
            }
        }

        Ok(())
    }

    fn validate_budget(field: &str, value: u32) -> ConfigResult<()> {
        if value == 0 {
            return Err(ConfigurationError::invalid_value(
                field,
                value,
                "must be greater than 0",
            ));
        }
        if value > MAX_CONFIGURABLE_BUDGET {
            return Err(ConfigurationError::invalid_value(
                field,
                value,
                format!("should not exceed {MAX_CONFIGURABLE_BUDGET}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ResilienceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.boundary.max_retries, 3);
        assert_eq!(config.views.max_attempts, 3);
        assert!(config.boundary.retry_delay().is_none());
    }

    #[test]
    fn test_budget_validation() {
        let mut config = ResilienceConfig::default();
        config.boundary.max_retries = 0;
        assert!(config.validate().is_err());

        config.boundary.max_retries = 3;
        config.views.max_attempts = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_route_validation() {
        let mut config = ResilienceConfig::default();
        config.routes = vec![
            RouteConfig {
                pattern: "/checkout".to_string(),
                module: "checkout".to_string(),
            },
            RouteConfig {
                pattern: "/checkout".to_string(),
                module: "checkout-v2".to_string(),
            },
        ];
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { .. })
        ));

        config.routes.pop();
        config.routes[0].pattern = "checkout".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_environment_mapping() {
        assert_eq!(
            DeploymentEnvironment::from_name("Development"),
            DeploymentEnvironment::Development
        );
        assert_eq!(
            DeploymentEnvironment::from_name("test"),
            DeploymentEnvironment::Test
        );
        assert_eq!(
            DeploymentEnvironment::from_name("staging"),
            DeploymentEnvironment::Production
        );
        assert!(!DeploymentEnvironment::Test.is_development());
    }
}
