//! Configuration loading from a directory of YAML files

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use view_resilience::config::{ConfigManager, ConfigurationError, DeploymentEnvironment};
use view_resilience::routing::{RouteTable, ViewOptions};

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

const BASE: &str = r#"
boundary:
  max_retries: 2
views:
  max_attempts: 4
preload:
  eager: [home, products]
routes:
  - pattern: /
    module: home
  - pattern: /products/:id
    module: product-detail
client:
  origin: https://shop.example.com
"#;

#[test]
fn environment_file_overrides_base() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "resilience.yaml", BASE);
    write(
        dir.path(),
        "resilience.production.yaml",
        "boundary:\n  retry_delay_ms: 1500\npreload:\n  hover_enabled: false\n",
    );

    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "production")
            .unwrap();
    let config = manager.config();

    assert_eq!(manager.environment(), "production");
    assert_eq!(config.environment, DeploymentEnvironment::Production);
    assert_eq!(config.boundary.max_retries, 2);
    assert_eq!(config.boundary.retry_delay_ms, 1500);
    assert!(!config.preload.hover_enabled);
    assert_eq!(config.preload.eager, vec!["home", "products"]);

    let routes = RouteTable::from_config(&config.routes);
    assert_eq!(routes.resolve("/products/3").unwrap().as_str(), "product-detail");
    assert_eq!(ViewOptions::from_config(config).max_attempts, 4);
}

#[test]
fn missing_files_fall_back_to_defaults() {
    let dir = TempDir::new().unwrap();

    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test").unwrap();
    let config = manager.config();

    assert_eq!(config.environment, DeploymentEnvironment::Test);
    assert_eq!(config.boundary.max_retries, 3);
    assert_eq!(config.views.max_attempts, 3);
    assert!(config.routes.is_empty());
    assert_eq!(manager.config_directory(), dir.path());
}

#[test]
fn invalid_budget_is_rejected() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "resilience.yaml", "views:\n  max_attempts: 0\n");

    let error =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "development")
            .unwrap_err();
    assert!(matches!(
        error,
        ConfigurationError::InvalidValue { ref field, .. } if field == "views.max_attempts"
    ));
}

#[test]
fn duplicate_routes_are_rejected() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "resilience.yaml",
        "routes:\n  - pattern: /cart\n    module: cart\n  - pattern: /cart\n    module: basket\n",
    );

    let error =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "development")
            .unwrap_err();
    assert!(error.to_string().contains("duplicate route pattern"));
}

#[test]
fn missing_directory_is_reported() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent");

    let error = ConfigManager::load_from_directory_with_env(Some(missing.clone()), "development")
        .unwrap_err();
    assert_eq!(error, ConfigurationError::DirectoryNotFound { path: missing });
}
