//! # Preload Scheduler
//!
//! Warms [`ModuleLoader`] entries ahead of navigation: an eager list at
//! application start, and hover-driven preloading of same-origin links.
//! Every warm goes through [`ModuleLoader::preload`], so the at-most-one
//! fetch guarantee still holds when a preload races a render.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use futures::FutureExt;
//! use view_resilience::config::ResilienceConfig;
//! use view_resilience::events::{DocumentEventBus, PointerEvent};
//! use view_resilience::loader::{FnFetcher, ModuleId, ModuleLoader};
//! use view_resilience::preload::PreloadScheduler;
//! use view_resilience::view::FnComponent;
//!
//! # async fn example() -> view_resilience::Result<()> {
//! let loader = Arc::new(ModuleLoader::new(Arc::new(FnFetcher::new(|id: ModuleId| {
//!     async move { Ok(FnComponent::static_markup(id.to_string(), "<main/>")) }.boxed()
//! }))));
//! let scheduler = PreloadScheduler::from_config(loader, &ResilienceConfig::default());
//! scheduler.start(["home"]);
//!
//! let bus = DocumentEventBus::default();
//! scheduler.install_hover_listener(bus.subscribe())?;
//! bus.publish(PointerEvent::over_link("/products"));
//! scheduler.shutdown();
//! # Ok(())
//! # }
//! ```

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::config::ResilienceConfig;
use crate::error::{ResilienceError, Result};
use crate::events::PointerEvent;
use crate::lifecycle::ScopedTask;
use crate::loader::{ModuleId, ModuleLoader};
use crate::routing::RouteTable;

/// Path of `href` when it points at `origin`, `None` for cross-origin links.
///
/// Accepts root-relative paths (a single leading `/`) and absolute URLs whose
/// scheme, host and port match `origin` exactly, ignoring ASCII case.
pub fn same_origin_path<'a>(href: &'a str, origin: &str) -> Option<&'a str> {
    if href.starts_with('/') {
        return (!href.starts_with("//")).then_some(href);
    }

    let origin = origin.trim_end_matches('/');
    let prefix = href.get(..origin.len())?;
    if origin.is_empty() || !prefix.eq_ignore_ascii_case(origin) {
        return None;
    }

    let rest = &href[origin.len()..];
    match rest.chars().next() {
        None | Some('?') | Some('#') => Some("/"),
        Some('/') => Some(rest),
        // `https://shop.example.com.evil` or a different port
        Some(_) => None,
    }
}

struct SchedulerInner {
    loader: Arc<ModuleLoader>,
    routes: RouteTable,
    origin: String,
    warmed: Mutex<HashSet<ModuleId>>,
}

impl SchedulerInner {
    fn warm(&self, id: ModuleId) -> bool {
        if !self.warmed.lock().insert(id.clone()) {
            return false;
        }
        self.loader.preload(id)
    }

    fn on_pointer(&self, event: &PointerEvent) {
        let Some(href) = event.href.as_deref() else {
            return;
        };
        let Some(path) = same_origin_path(href, &self.origin) else {
            return;
        };
        let Some(module_id) = self.routes.resolve(path) else {
            debug!(path = %path, "Hovered link has no registered view");
            return;
        };

        if self.warm(module_id.clone()) {
            debug!(module_id = %module_id, path = %path, "Preloading hovered view");
        }
    }
}

/// Warms the module cache ahead of need
pub struct PreloadScheduler {
    inner: Arc<SchedulerInner>,
    hover_enabled: bool,
    listener_installed: AtomicBool,
    listener: Mutex<Option<ScopedTask>>,
}

impl PreloadScheduler {
    pub fn new(loader: Arc<ModuleLoader>, routes: RouteTable, origin: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                loader,
                routes,
                origin: origin.into(),
                warmed: Mutex::new(HashSet::new()),
            }),
            hover_enabled: true,
            listener_installed: AtomicBool::new(false),
            listener: Mutex::new(None),
        }
    }

    pub fn from_config(loader: Arc<ModuleLoader>, config: &ResilienceConfig) -> Self {
        let mut scheduler = Self::new(
            loader,
            RouteTable::from_config(&config.routes),
            config.client.origin.clone(),
        );
        scheduler.hover_enabled = config.preload.hover_enabled;
        scheduler
    }

    /// Warm every eager module; returns how many new fetches were issued.
    ///
    /// Failures are left to the loader, which logs them and caches the
    /// placeholder for whoever renders the view later.
    pub fn start<I>(&self, eager: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<ModuleId>,
    {
        let issued = eager
            .into_iter()
            .map(Into::into)
            .filter(|id: &ModuleId| self.inner.warm(id.clone()))
            .count();
        info!(issued = issued, "Eager preload started");
        issued
    }

    /// Warm one module; `true` when this call issued its fetch.
    ///
    /// An id already in the warmed registry is never requested again, even
    /// after the loader dropped its failed entry.
    pub fn warm(&self, id: impl Into<ModuleId>) -> bool {
        self.inner.warm(id.into())
    }

    /// Whether this scheduler has ever requested `id`
    pub fn is_warmed(&self, id: &ModuleId) -> bool {
        self.inner.warmed.lock().contains(id)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    /// Attach the document-level hover listener.
    ///
    /// Allowed once per scheduler lifetime, even after [`shutdown`](Self::shutdown).
    /// Returns `false` when hover preloading is disabled by configuration.
    pub fn install_hover_listener(
        &self,
        mut receiver: broadcast::Receiver<PointerEvent>,
    ) -> Result<bool> {
        if !self.hover_enabled {
            debug!("Hover preloading disabled, listener not installed");
            return Ok(false);
        }
        if self.listener_installed.swap(true, Ordering::AcqRel) {
            warn!("Hover listener already installed");
            return Err(ResilienceError::ListenerAlreadyInstalled);
        }

        let inner = Arc::clone(&self.inner);
        let task = ScopedTask::spawn("preload_hover_listener", async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => inner.on_pointer(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped = skipped, "Hover listener lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let Some(task) = task else {
            self.listener_installed.store(false, Ordering::Release);
            return Err(ResilienceError::RuntimeUnavailable(
                "preload hover listener".to_string(),
            ));
        };

        *self.listener.lock() = Some(task);
        info!("Hover preload listener installed");
        Ok(true)
    }

    pub fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Remove the hover listener; safe to call more than once
    pub fn shutdown(&self) {
        if let Some(task) = self.listener.lock().take() {
            task.cancel();
            info!("Hover preload listener removed");
        }
    }
}

impl Drop for PreloadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PreloadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadScheduler")
            .field("origin", &self.inner.origin)
            .field("routes", &self.inner.routes.len())
            .field("warmed", &self.inner.warmed.lock().len())
            .field("hover_enabled", &self.hover_enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use crate::events::DocumentEventBus;
    use crate::loader::{LoadError, LoadState, ModuleFetcher};
    use crate::view::{Component, FnComponent};
    use async_trait::async_trait;
    use std::time::Duration;

    struct StaticFetcher;

    #[async_trait]
    impl ModuleFetcher for StaticFetcher {
        async fn fetch(&self, id: &ModuleId) -> std::result::Result<Arc<dyn Component>, LoadError> {
            if id.as_str() == "offline" {
                return Err(LoadError::rejected(id, "offline"));
            }
            Ok(FnComponent::static_markup(id.to_string(), "<main/>"))
        }
    }

    fn scheduler() -> (Arc<ModuleLoader>, PreloadScheduler) {
        let loader = Arc::new(ModuleLoader::new(Arc::new(StaticFetcher)));
        let routes = RouteTable::new()
            .with_route("/", "home")
            .with_route("/products/:id", "product-detail");
        let scheduler = PreloadScheduler::new(Arc::clone(&loader), routes, "https://shop.example.com");
        (loader, scheduler)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_same_origin_path() {
        let origin = "https://shop.example.com";
        assert_eq!(same_origin_path("/cart", origin), Some("/cart"));
        assert_eq!(same_origin_path("//cdn.example.com/x", origin), None);
        assert_eq!(
            same_origin_path("https://shop.example.com/products/1?x=1", origin),
            Some("/products/1?x=1")
        );
        assert_eq!(same_origin_path("HTTPS://Shop.Example.com", origin), Some("/"));
        assert_eq!(same_origin_path("https://shop.example.com:8443/cart", origin), None);
        assert_eq!(same_origin_path("https://shop.example.com.evil/cart", origin), None);
        assert_eq!(same_origin_path("https://other.example.com/cart", origin), None);
        assert_eq!(same_origin_path("mailto:help@example.com", origin), None);
        assert_eq!(same_origin_path("products/1", origin), None);
    }

    #[tokio::test]
    async fn test_start_warms_eager_modules_once() {
        let (loader, scheduler) = scheduler();

        assert_eq!(scheduler.start(["home", "offline", "home"]), 2);
        settle().await;

        assert!(scheduler.is_warmed(&ModuleId::from("home")));
        assert_eq!(loader.state(&ModuleId::from("home")), Some(LoadState::Ready));
        assert_eq!(loader.state(&ModuleId::from("offline")), Some(LoadState::Failed));
        assert!(!scheduler.warm("home"));
        assert_eq!(loader.stats().fetches_issued, 2);
    }

    #[tokio::test]
    async fn test_cleared_failure_is_not_rewarmed() {
        let (loader, scheduler) = scheduler();
        let offline = ModuleId::from("offline");

        assert!(scheduler.warm("offline"));
        settle().await;
        assert_eq!(loader.state(&offline), Some(LoadState::Failed));

        assert!(loader.clear_failed(&offline));
        assert!(!scheduler.warm("offline"));
        assert!(scheduler.is_warmed(&offline));
        assert_eq!(loader.state(&offline), None);
        assert_eq!(loader.stats().fetches_issued, 1);
    }

    #[tokio::test]
    async fn test_hover_preloads_same_origin_links() {
        let (loader, scheduler) = scheduler();
        let bus = DocumentEventBus::default();
        assert!(scheduler.install_hover_listener(bus.subscribe()).unwrap());

        bus.publish(PointerEvent::over_element());
        bus.publish(PointerEvent::over_link("https://elsewhere.example.org/products/1"));
        bus.publish(PointerEvent::over_link("/about"));
        settle().await;
        assert_eq!(loader.stats().fetches_issued, 0);

        bus.publish(PointerEvent::over_link("/products/7"));
        bus.publish(PointerEvent::over_link("https://shop.example.com/products/8"));
        settle().await;

        assert!(scheduler.is_warmed(&ModuleId::from("product-detail")));
        assert_eq!(loader.stats().fetches_issued, 1);
    }

    #[tokio::test]
    async fn test_listener_installs_once() {
        let (_loader, scheduler) = scheduler();
        let bus = DocumentEventBus::default();

        scheduler.install_hover_listener(bus.subscribe()).unwrap();
        assert_eq!(
            scheduler.install_hover_listener(bus.subscribe()),
            Err(ResilienceError::ListenerAlreadyInstalled)
        );

        scheduler.shutdown();
        scheduler.shutdown();
        assert!(!scheduler.is_listening());
        assert_eq!(
            scheduler.install_hover_listener(bus.subscribe()),
            Err(ResilienceError::ListenerAlreadyInstalled)
        );
    }

    #[tokio::test]
    async fn test_drop_removes_listener() {
        let (loader, scheduler) = scheduler();
        let bus = DocumentEventBus::default();
        scheduler.install_hover_listener(bus.subscribe()).unwrap();
        assert_eq!(bus.listener_count(), 1);

        drop(scheduler);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(bus.listener_count(), 0);
        bus.publish(PointerEvent::over_link("/products/1"));
        settle().await;
        assert_eq!(loader.stats().fetches_issued, 0);
    }

    #[tokio::test]
    async fn test_hover_disabled_by_config() {
        let loader = Arc::new(ModuleLoader::new(Arc::new(StaticFetcher)));
        let mut config = ResilienceConfig::default();
        config.preload.hover_enabled = false;
        config.routes.push(RouteConfig {
            pattern: "/".to_string(),
            module: "home".to_string(),
        });

        let scheduler = PreloadScheduler::from_config(loader, &config);
        let bus = DocumentEventBus::default();
        assert!(!scheduler.install_hover_listener(bus.subscribe()).unwrap());
        assert_eq!(scheduler.routes().len(), 1);
    }
}
