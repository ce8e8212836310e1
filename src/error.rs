use thiserror::Error;

use crate::config::ConfigurationError;
use crate::reporting::SinkError;

/// Errors surfaced by the resilience layer's public API.
///
/// Render and load failures never appear here: they are contained by
/// [`crate::boundary::FailureBoundary`] and converted into values by
/// [`crate::loader::ModuleLoader`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResilienceError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Hover listener already installed for this application")]
    ListenerAlreadyInstalled,
    #[error("No tokio runtime available to run {0}")]
    RuntimeUnavailable(String),
    #[error("No view registered for path: {0}")]
    UnknownRoute(String),
    #[error("Reporting error: {0}")]
    Reporting(String),
}

impl From<ConfigurationError> for ResilienceError {
    fn from(error: ConfigurationError) -> Self {
        ResilienceError::Configuration(error.to_string())
    }
}

impl From<SinkError> for ResilienceError {
    fn from(error: SinkError) -> Self {
        ResilienceError::Reporting(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ResilienceError>;
