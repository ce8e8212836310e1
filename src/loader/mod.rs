//! # Module Loader
//!
//! Fetches UI modules on demand with at most one fetch in flight per module
//! identifier, caches the result, and turns a rejected fetch into a
//! renderable [`LoadFailurePlaceholder`].
//!
//! ## Guarantees
//!
//! - The first request for an identifier issues the fetch; every concurrent
//!   request attaches to the same shared future and observes the same value.
//! - A `Ready` entry is never fetched again.
//! - The returned future never fails: rejections and fetcher panics resolve to
//!   [`LoadedModule::Failed`].
//!
//! ## Usage
//!
//! ```rust
//! use futures::FutureExt;
//! use std::sync::Arc;
//! use view_resilience::loader::{FnFetcher, ModuleId, ModuleLoader};
//! use view_resilience::view::FnComponent;
//!
//! # async fn example() {
//! let loader = ModuleLoader::new(Arc::new(FnFetcher::new(|id: ModuleId| {
//!     async move { Ok(FnComponent::static_markup(id.to_string(), "<main/>")) }.boxed()
//! })));
//!
//! let module = loader.load("home").await;
//! assert!(module.is_ready());
//! # }
//! ```

pub mod fetcher;
pub mod placeholder;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::logging::log_module_operation;
use crate::view::RenderError;

pub use fetcher::{FnFetcher, LoadError, ModuleFetcher, ModuleId};
pub use placeholder::{LoadFailurePlaceholder, LoadedModule};

/// Shared handle to one load operation
pub type LoadHandle = Shared<BoxFuture<'static, LoadedModule>>;

/// Lifecycle of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Pending,
    Ready,
    Failed,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One module's load operation. Replaced wholesale on forced retry, never
/// mutated in place except for its own state cell.
struct ModuleCacheEntry {
    state: Arc<RwLock<LoadState>>,
    future: LoadHandle,
}

/// Statistics about the module cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderStats {
    pub pending: usize,
    pub ready: usize,
    pub failed: usize,
    /// Fetcher invocations since the loader was created
    pub fetches_issued: u64,
}

/// Caching, single-flight module loader
pub struct ModuleLoader {
    fetcher: Arc<dyn ModuleFetcher>,
    entries: DashMap<ModuleId, ModuleCacheEntry>,
    fetches_issued: Arc<AtomicU64>,
}

impl ModuleLoader {
    pub fn new(fetcher: Arc<dyn ModuleFetcher>) -> Self {
        Self {
            fetcher,
            entries: DashMap::new(),
            fetches_issued: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Request a module, attaching to any load already in flight
    pub fn load(&self, id: impl Into<ModuleId>) -> LoadHandle {
        self.acquire(id.into(), false).0
    }

    /// Like [`load`](Self::load), but a `Failed` entry is discarded and
    /// fetched again
    pub fn load_forced(&self, id: impl Into<ModuleId>) -> LoadHandle {
        self.acquire(id.into(), true).0
    }

    /// Warm the cache without waiting for the result.
    ///
    /// Returns `true` when this call issued a new fetch.
    pub fn preload(&self, id: impl Into<ModuleId>) -> bool {
        let id = id.into();
        let issued = self.acquire(id.clone(), false).1;
        if !issued {
            debug!(module_id = %id, "Preload skipped, module already requested");
        }
        issued
    }

    /// Resolved value for a module, if its load has completed
    pub fn peek(&self, id: &ModuleId) -> Option<LoadedModule> {
        self.entries
            .get(id)
            .and_then(|entry| entry.future.peek().cloned())
    }

    pub fn state(&self, id: &ModuleId) -> Option<LoadState> {
        self.entries.get(id).map(|entry| *entry.state.read())
    }

    /// Drop a `Failed` entry so the next request fetches again
    pub fn clear_failed(&self, id: &ModuleId) -> bool {
        let removed = self
            .entries
            .remove_if(id, |_, entry| *entry.state.read() == LoadState::Failed)
            .is_some();
        if removed {
            log_module_operation("clear_failed", id.as_str(), "cleared", None);
        }
        removed
    }

    pub fn stats(&self) -> LoaderStats {
        let mut stats = LoaderStats {
            fetches_issued: self.fetches_issued.load(Ordering::Acquire),
            ..LoaderStats::default()
        };
        for entry in self.entries.iter() {
            match *entry.state.read() {
                LoadState::Pending => stats.pending += 1,
                LoadState::Ready => stats.ready += 1,
                LoadState::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Check-then-set under the map's shard lock, before any await
    fn acquire(&self, id: ModuleId, force_retry: bool) -> (LoadHandle, bool) {
        match self.entries.entry(id) {
            Entry::Occupied(mut occupied) => {
                let failed = *occupied.get().state.read() == LoadState::Failed;
                if force_retry && failed {
                    let entry = self.start_load(occupied.key().clone());
                    let future = entry.future.clone();
                    occupied.insert(entry);
                    log_module_operation("load", occupied.key().as_str(), "retrying", None);
                    (future, true)
                } else {
                    (occupied.get().future.clone(), false)
                }
            }
            Entry::Vacant(vacant) => {
                let entry = self.start_load(vacant.key().clone());
                let future = entry.future.clone();
                vacant.insert(entry);
                (future, true)
            }
        }
    }

    fn start_load(&self, id: ModuleId) -> ModuleCacheEntry {
        let state = Arc::new(RwLock::new(LoadState::Pending));
        let entry_state = Arc::clone(&state);
        let fetcher = Arc::clone(&self.fetcher);
        let fetches_issued = Arc::clone(&self.fetches_issued);

        let future = async move {
            fetches_issued.fetch_add(1, Ordering::AcqRel);
            log_module_operation("fetch", id.as_str(), "started", None);

            let outcome = AssertUnwindSafe(fetcher.fetch(&id)).catch_unwind().await;
            let rejection = match outcome {
                Ok(Ok(component)) => {
                    *entry_state.write() = LoadState::Ready;
                    log_module_operation("fetch", id.as_str(), "ready", None);
                    return LoadedModule::Ready(component);
                }
                Ok(Err(error)) => error,
                Err(payload) => LoadError::Panicked {
                    module: id.clone(),
                    message: RenderError::from_panic(payload).message,
                },
            };

            *entry_state.write() = LoadState::Failed;
            warn!(module_id = %id, error = %rejection, "Module load failed, substituting placeholder");
            LoadedModule::Failed(Arc::new(LoadFailurePlaceholder::new(
                id,
                rejection.to_string(),
            )))
        }
        .boxed()
        .shared();

        // Drive the fetch independently of whoever asked for it; dropping
        // interest never cancels a load another caller may need.
        if let Ok(runtime) = Handle::try_current() {
            runtime.spawn(future.clone().map(|_| ()));
        }

        ModuleCacheEntry { state, future }
    }
}

impl fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::FnComponent;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Fetcher that counts calls and waits for a release signal
    struct GatedFetcher {
        calls: AtomicUsize,
        release: Notify,
        fail: bool,
    }

    impl GatedFetcher {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                release: Notify::new(),
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModuleFetcher for GatedFetcher {
        async fn fetch(
            &self,
            id: &ModuleId,
        ) -> Result<Arc<dyn crate::view::Component>, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            if self.fail {
                Err(LoadError::rejected(id, "chunk load error"))
            } else {
                Ok(FnComponent::static_markup(id.to_string(), "<main/>"))
            }
        }
    }

    /// Fetcher that resolves immediately
    struct InstantFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModuleFetcher for InstantFetcher {
        async fn fetch(
            &self,
            id: &ModuleId,
        ) -> Result<Arc<dyn crate::view::Component>, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if id.as_str().starts_with("broken") {
                Err(LoadError::rejected(id, "syntax error"))
            } else if id.as_str() == "panics" {
                panic!("fetcher bug")
            } else {
                Ok(FnComponent::static_markup(id.to_string(), "<main/>"))
            }
        }
    }

    fn instant_loader() -> (ModuleLoader, Arc<InstantFetcher>) {
        let fetcher = Arc::new(InstantFetcher {
            calls: AtomicUsize::new(0),
        });
        (ModuleLoader::new(fetcher.clone()), fetcher)
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let fetcher = GatedFetcher::new(false);
        let loader = ModuleLoader::new(fetcher.clone());

        let handles: Vec<_> = (0..5).map(|_| loader.load("profile")).collect();
        tokio::task::yield_now().await;
        assert_eq!(loader.state(&ModuleId::from("profile")), Some(LoadState::Pending));

        fetcher.release.notify_one();
        let results = futures::future::join_all(handles).await;

        assert_eq!(fetcher.calls(), 1);
        let first = results[0].component();
        for result in &results {
            assert!(result.is_ready());
            assert!(Arc::ptr_eq(&result.component(), &first));
        }
        assert_eq!(loader.stats().fetches_issued, 1);
    }

    #[tokio::test]
    async fn test_rejected_fetch_resolves_to_placeholder() {
        let (loader, _) = instant_loader();
        let module = loader.load("broken-checkout").await;

        assert!(module.is_failed());
        let node = module.component().render().unwrap();
        assert_eq!(
            node.fallback().unwrap().title,
            "Failed to load broken-checkout"
        );
        assert_eq!(
            loader.state(&ModuleId::from("broken-checkout")),
            Some(LoadState::Failed)
        );
    }

    #[tokio::test]
    async fn test_panicking_fetcher_resolves_to_placeholder() {
        let (loader, _) = instant_loader();
        let module = loader.load("panics").await;
        match module {
            LoadedModule::Failed(placeholder) => {
                assert!(placeholder.reason().contains("fetcher bug"));
            }
            LoadedModule::Ready(_) => panic!("expected a placeholder"),
        }
    }

    #[tokio::test]
    async fn test_failed_entry_is_sticky_without_force() {
        let (loader, fetcher) = instant_loader();
        loader.load("broken").await;
        let again = loader.load("broken").await;

        assert!(again.is_failed());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forced_retry_refetches_failed_module() {
        let (loader, fetcher) = instant_loader();
        loader.load("broken").await;
        loader.load_forced("broken").await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(loader.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_ready_module_is_never_refetched() {
        let (loader, fetcher) = instant_loader();
        loader.load("home").await;
        loader.load_forced("home").await;
        assert!(!loader.preload("home"));

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(loader.peek(&ModuleId::from("home")).unwrap().is_ready());
    }

    #[tokio::test]
    async fn test_preload_is_idempotent_while_pending() {
        let fetcher = GatedFetcher::new(false);
        let loader = ModuleLoader::new(fetcher.clone());

        assert!(loader.preload("search"));
        assert!(!loader.preload("search"));
        tokio::task::yield_now().await;
        fetcher.release.notify_one();

        let module = loader.load("search").await;
        assert!(module.is_ready());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_preload_completes_without_awaiting_caller() {
        let (loader, _) = instant_loader();
        loader.preload("home");

        let id = ModuleId::from("home");
        for _ in 0..10 {
            if loader.peek(&id).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(loader.state(&id), Some(LoadState::Ready));
    }

    #[tokio::test]
    async fn test_clear_failed_only_removes_failures() {
        let (loader, _) = instant_loader();
        loader.load("home").await;
        loader.load("broken").await;

        assert!(!loader.clear_failed(&ModuleId::from("home")));
        assert!(loader.clear_failed(&ModuleId::from("broken")));
        assert_eq!(loader.state(&ModuleId::from("broken")), None);
        assert_eq!(
            loader.stats(),
            LoaderStats {
                pending: 0,
                ready: 1,
                failed: 0,
                fetches_issued: 2,
            }
        );
    }
}
