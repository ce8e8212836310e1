use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::view::Component;

/// Opaque key naming one lazily loadable unit of UI
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&ModuleId> for ModuleId {
    fn from(id: &ModuleId) -> Self {
        id.clone()
    }
}

/// Why a module fetch was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Module not found: {0}")]
    NotFound(ModuleId),
    #[error("Network error loading {module}: {reason}")]
    Network { module: ModuleId, reason: String },
    #[error("Module fetcher panicked while loading {module}: {message}")]
    Panicked { module: ModuleId, message: String },
    #[error("Failed to load {module}: {reason}")]
    Rejected { module: ModuleId, reason: String },
}

impl LoadError {
    pub fn rejected(module: &ModuleId, reason: impl Into<String>) -> Self {
        Self::Rejected {
            module: module.clone(),
            reason: reason.into(),
        }
    }
}

/// Fetches the component for a module identifier.
///
/// This is the asynchronous "import a UI module" operation the loader wraps.
#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    async fn fetch(&self, id: &ModuleId) -> Result<Arc<dyn Component>, LoadError>;
}

type FetchFn =
    dyn Fn(ModuleId) -> BoxFuture<'static, Result<Arc<dyn Component>, LoadError>> + Send + Sync;

/// Closure-backed fetcher
pub struct FnFetcher {
    fetch: Box<FetchFn>,
}

impl FnFetcher {
    pub fn new<F>(fetch: F) -> Self
    where
        F: Fn(ModuleId) -> BoxFuture<'static, Result<Arc<dyn Component>, LoadError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            fetch: Box::new(fetch),
        }
    }
}

#[async_trait]
impl ModuleFetcher for FnFetcher {
    async fn fetch(&self, id: &ModuleId) -> Result<Arc<dyn Component>, LoadError> {
        (self.fetch)(id.clone()).await
    }
}
