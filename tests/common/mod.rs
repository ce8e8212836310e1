//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use view_resilience::loader::{LoadError, ModuleFetcher, ModuleId};
use view_resilience::view::{Component, FnComponent, RenderError, ViewNode};

/// Fetcher with per-module call counts and a configurable set of rejections
#[derive(Default)]
pub struct CountingFetcher {
    calls: Mutex<HashMap<ModuleId, u32>>,
    rejected: Mutex<HashSet<ModuleId>>,
}

impl CountingFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting(ids: &[&str]) -> Arc<Self> {
        let fetcher = Self::default();
        fetcher
            .rejected
            .lock()
            .extend(ids.iter().map(|id| ModuleId::from(*id)));
        Arc::new(fetcher)
    }

    pub fn calls(&self, id: &str) -> u32 {
        self.calls
            .lock()
            .get(&ModuleId::from(id))
            .copied()
            .unwrap_or_default()
    }

    pub fn heal(&self, id: &str) {
        self.rejected.lock().remove(&ModuleId::from(id));
    }
}

#[async_trait]
impl ModuleFetcher for CountingFetcher {
    async fn fetch(&self, id: &ModuleId) -> Result<Arc<dyn Component>, LoadError> {
        *self.calls.lock().entry(id.clone()).or_default() += 1;
        tokio::task::yield_now().await;

        if self.rejected.lock().contains(id) {
            return Err(LoadError::Network {
                module: id.clone(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(FnComponent::static_markup(
            id.to_string(),
            format!("<section data-module=\"{id}\"/>"),
        ))
    }
}

/// Component that always fails with `message`
pub fn throwing(name: &str, message: &'static str) -> Arc<dyn Component> {
    FnComponent::shared(name, move || Err(RenderError::new(message)))
}

/// Component counting how often it rendered
pub fn counted(name: &str, renders: Arc<AtomicU32>) -> Arc<dyn Component> {
    let markup = format!("<{name}/>");
    FnComponent::shared(name, move || {
        renders.fetch_add(1, Ordering::SeqCst);
        Ok(ViewNode::markup(markup.clone()))
    })
}
