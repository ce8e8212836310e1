use std::sync::Arc;
use tracing::{debug, info};

use crate::boundary::{BoundaryConfig, FailureBoundary};
use crate::config::{BoundarySettings, ResilienceConfig};
use crate::constants::DEFAULT_MAX_ATTEMPTS;
use crate::error::{ResilienceError, Result};
use crate::loader::{LoadFailurePlaceholder, LoadHandle, LoadedModule, ModuleId, ModuleLoader};
use crate::logging::log_module_operation;
use crate::reporting::FailureReporter;
use crate::view::{Affordance, ErrorDetails, FallbackView, Severity, ViewNode};

use super::RouteTable;

/// Mount-time settings for a routed view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewOptions {
    /// `Page` for full routes, `Component` for nested views
    pub severity: Severity,
    pub max_attempts: u32,
    pub boundary: BoundarySettings,
    /// Path the view is mounted at, carried into failure reports
    pub location: String,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            severity: Severity::Page,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            boundary: BoundarySettings::default(),
            location: "/".to_string(),
        }
    }
}

impl ViewOptions {
    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self {
            max_attempts: config.views.max_attempts,
            boundary: config.boundary.clone(),
            ..Self::default()
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attempt budget, never below one
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

/// Where a routed view is in its lifecycle
pub enum ViewPhase {
    /// Waiting on the module loader
    Pending(LoadHandle),
    /// Module resolved and mounted inside a fresh boundary
    Ready(FailureBoundary),
    /// Module fetch was rejected
    LoadFailed(Arc<LoadFailurePlaceholder>),
}

impl ViewPhase {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending(_) => "pending",
            Self::Ready(_) => "ready",
            Self::LoadFailed(_) => "load_failed",
        }
    }
}

impl std::fmt::Debug for ViewPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending(_) => f.write_str("Pending"),
            Self::Ready(boundary) => f.debug_tuple("Ready").field(boundary).finish(),
            Self::LoadFailed(placeholder) => f.debug_tuple("LoadFailed").field(placeholder).finish(),
        }
    }
}

/// Result of dispatching a fallback affordance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// A fresh attempt started; `attempt` is the number now displayed
    Retried { attempt: u32 },
    /// The view is healthy or its attempt budget is spent
    RetryUnavailable,
    /// The host should perform a full document reload
    ReloadRequested,
    /// The host should navigate to the previous entry
    NavigateBack,
}

/// One routed view: suspension while the module loads, a boundary around the
/// loaded component, and a retry affordance bounded by `max_attempts`.
///
/// `attempts` counts explicit retries, so the fallback shows
/// `"Attempt {attempts + 1} of {max_attempts}"` and hides retry once the last
/// attempt is on screen. The budget belongs to this mounted instance only.
pub struct RetryableView {
    module_id: ModuleId,
    options: ViewOptions,
    loader: Arc<ModuleLoader>,
    reporter: FailureReporter,
    attempts: u32,
    phase: ViewPhase,
}

impl RetryableView {
    /// Mount the view, requesting its module immediately
    pub fn mount(
        module_id: impl Into<ModuleId>,
        loader: Arc<ModuleLoader>,
        reporter: FailureReporter,
        options: ViewOptions,
    ) -> Self {
        let module_id = module_id.into();
        let handle = loader.load(&module_id);
        debug!(
            module_id = %module_id,
            severity = %options.severity,
            max_attempts = options.max_attempts,
            "Routed view mounted"
        );

        let mut view = Self {
            module_id,
            options,
            loader,
            reporter,
            attempts: 0,
            phase: ViewPhase::Pending(handle),
        };
        view.advance();
        view
    }

    /// Mount the view registered for `path`
    pub fn for_path(
        routes: &RouteTable,
        path: &str,
        loader: Arc<ModuleLoader>,
        reporter: FailureReporter,
        options: ViewOptions,
    ) -> Result<Self> {
        let module_id = routes
            .resolve(path)
            .cloned()
            .ok_or_else(|| ResilienceError::UnknownRoute(path.to_string()))?;

        Ok(Self::mount(
            module_id,
            loader,
            reporter,
            options.with_location(path),
        ))
    }

    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.options.max_attempts
    }

    pub fn phase(&self) -> &ViewPhase {
        &self.phase
    }

    pub fn is_pending(&self) -> bool {
        self.phase.is_pending()
    }

    /// Whether the view is currently showing its own fallback
    pub fn is_failed(&self) -> bool {
        match &self.phase {
            ViewPhase::Pending(_) => false,
            ViewPhase::Ready(boundary) => boundary.has_failed(),
            ViewPhase::LoadFailed(_) => true,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.options.severity.allows_retry()
            && self.attempts.saturating_add(1) < self.options.max_attempts
    }

    /// The boundary guarding the loaded component, once ready
    pub fn boundary(&self) -> Option<&FailureBoundary> {
        match &self.phase {
            ViewPhase::Ready(boundary) => Some(boundary),
            _ => None,
        }
    }

    /// Wait for the pending load, if any, and move out of `Pending`
    pub async fn resolve(&mut self) {
        let handle = match &self.phase {
            ViewPhase::Pending(handle) => handle.clone(),
            _ => return,
        };
        let loaded = handle.await;
        self.settle(loaded);
    }

    /// Render one frame without blocking.
    ///
    /// A module that already settled renders immediately; otherwise the
    /// loading indicator for this view's granularity is returned.
    pub fn render(&mut self) -> ViewNode {
        self.advance();

        match &self.phase {
            ViewPhase::Pending(_) => ViewNode::loading(self.options.severity.loading_message()),
            ViewPhase::LoadFailed(placeholder) => {
                let title = placeholder.fallback().title;
                ViewNode::Fallback(self.fallback(title, None))
            }
            ViewPhase::Ready(boundary) => {
                let node = boundary.render();
                if !boundary.has_failed() {
                    return node;
                }
                ViewNode::Fallback(self.fallback(
                    self.options.severity.fallback_title().to_string(),
                    Some(boundary),
                ))
            }
        }
    }

    /// Start a fresh attempt if the budget allows
    pub fn retry(&mut self) -> ActionOutcome {
        if !self.is_failed() || !self.can_retry() {
            debug!(
                module_id = %self.module_id,
                attempts = self.attempts,
                "Retry unavailable for routed view"
            );
            return ActionOutcome::RetryUnavailable;
        }

        if let ViewPhase::Ready(boundary) = &self.phase {
            boundary.unmount();
        }

        self.attempts += 1;
        let attempt = self.attempts + 1;
        info!(
            module_id = %self.module_id,
            attempt = attempt,
            max_attempts = self.options.max_attempts,
            "Retrying routed view"
        );

        self.phase = ViewPhase::Pending(self.loader.load_forced(&self.module_id));
        self.advance();
        ActionOutcome::Retried { attempt }
    }

    /// Act on an affordance the user picked from the fallback
    pub fn dispatch(&mut self, affordance: Affordance) -> ActionOutcome {
        match affordance {
            Affordance::Retry => self.retry(),
            Affordance::Reload => ActionOutcome::ReloadRequested,
            Affordance::GoBack => ActionOutcome::NavigateBack,
        }
    }

    /// Tear down the mounted boundary and its timers
    pub fn unmount(&self) {
        if let ViewPhase::Ready(boundary) = &self.phase {
            boundary.unmount();
        }
        debug!(module_id = %self.module_id, "Routed view unmounted");
    }

    fn advance(&mut self) {
        let settled = match &self.phase {
            ViewPhase::Pending(handle) => handle
                .peek()
                .cloned()
                .or_else(|| self.loader.peek(&self.module_id)),
            _ => None,
        };

        if let Some(loaded) = settled {
            self.settle(loaded);
        }
    }

    fn settle(&mut self, loaded: LoadedModule) {
        self.phase = match loaded {
            LoadedModule::Ready(component) => {
                let config = BoundaryConfig::from_settings(
                    format!("view:{}", self.module_id),
                    self.options.severity,
                    &self.options.boundary,
                )
                .with_location(self.options.location.clone());
                ViewPhase::Ready(FailureBoundary::new(config, component, self.reporter.clone()))
            }
            LoadedModule::Failed(placeholder) => {
                log_module_operation(
                    "render",
                    self.module_id.as_str(),
                    "load_failed",
                    Some(placeholder.reason()),
                );
                ViewPhase::LoadFailed(placeholder)
            }
        };
    }

    fn fallback(&self, title: String, boundary: Option<&FailureBoundary>) -> FallbackView {
        let severity = self.options.severity;
        let mut fallback = FallbackView::new(severity, title, severity.fallback_message());
        fallback.attempt = Some(format!(
            "Attempt {} of {}",
            self.attempts + 1,
            self.options.max_attempts
        ));

        if self.can_retry() {
            fallback = fallback.with_affordance(Affordance::Retry);
        }
        fallback = fallback
            .with_affordance(Affordance::Reload)
            .with_affordance(Affordance::GoBack);

        if let Some(boundary) = boundary {
            let record = boundary.record();
            fallback.failure_id = Some(record.failure_id);
            if self.reporter.environment().is_development() {
                fallback.details = record.error.map(|error| ErrorDetails {
                    message: error.message,
                    stack: error.stack,
                });
            }
        }

        fallback
    }
}

impl std::fmt::Debug for RetryableView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryableView")
            .field("module_id", &self.module_id)
            .field("attempts", &self.attempts)
            .field("max_attempts", &self.options.max_attempts)
            .field("phase", &self.phase.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoadError, ModuleFetcher};
    use crate::view::{Component, FnComponent, RenderError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Rejects until `healthy` is set
    struct FlakyFetcher {
        healthy: AtomicBool,
        calls: AtomicU32,
    }

    impl FlakyFetcher {
        fn new(healthy: bool) -> Arc<Self> {
            Arc::new(Self {
                healthy: AtomicBool::new(healthy),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ModuleFetcher for FlakyFetcher {
        async fn fetch(&self, id: &ModuleId) -> std::result::Result<Arc<dyn Component>, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.healthy.load(Ordering::SeqCst) {
                return Err(LoadError::rejected(id, "network unreachable"));
            }
            if id.as_str() == "boom" {
                return Ok(FnComponent::shared("Boom", || Err(RenderError::new("boom"))));
            }
            Ok(FnComponent::static_markup(id.to_string(), format!("<main>{id}</main>")))
        }
    }

    fn mount(fetcher: Arc<FlakyFetcher>, id: &str) -> RetryableView {
        let loader = Arc::new(ModuleLoader::new(fetcher));
        RetryableView::mount(id, loader, FailureReporter::development(), ViewOptions::default())
    }

    #[tokio::test]
    async fn test_pending_view_shows_loading_for_its_granularity() {
        let loader = Arc::new(ModuleLoader::new(FlakyFetcher::new(true)));
        let mut page = RetryableView::mount(
            "orders",
            Arc::clone(&loader),
            FailureReporter::development(),
            ViewOptions::default(),
        );
        let mut widget = RetryableView::mount(
            "cart-summary",
            loader,
            FailureReporter::development(),
            ViewOptions::default().with_severity(Severity::Component),
        );

        assert_eq!(page.render(), ViewNode::loading("Loading page..."));
        assert_eq!(widget.render(), ViewNode::loading("Loading component..."));

        page.resolve().await;
        assert_eq!(page.render(), ViewNode::markup("<main>orders</main>"));
        assert_eq!(page.phase().name(), "ready");
    }

    #[tokio::test]
    async fn test_load_failure_shows_attempt_counter() {
        let mut view = mount(FlakyFetcher::new(false), "checkout");
        view.resolve().await;

        let node = view.render();
        let fallback = node.fallback().unwrap();
        assert_eq!(fallback.title, "Failed to load checkout");
        assert_eq!(fallback.attempt.as_deref(), Some("Attempt 1 of 3"));
        assert!(fallback.offers(Affordance::Retry));
        assert!(fallback.offers(Affordance::Reload));
        assert!(fallback.offers(Affordance::GoBack));
    }

    #[tokio::test]
    async fn test_zero_attempt_budget_is_clamped() {
        assert_eq!(ViewOptions::default().with_max_attempts(0).max_attempts, 1);

        let loader = Arc::new(ModuleLoader::new(FlakyFetcher::new(false)));
        let mut view = RetryableView::mount(
            "checkout",
            loader,
            FailureReporter::development(),
            ViewOptions::default().with_max_attempts(0),
        );
        view.resolve().await;

        let node = view.render();
        let fallback = node.fallback().unwrap();
        assert_eq!(fallback.attempt.as_deref(), Some("Attempt 1 of 1"));
        assert!(!fallback.offers(Affordance::Retry));
        assert!(fallback.offers(Affordance::Reload));
    }

    #[tokio::test]
    async fn test_retry_budget_exhausts() {
        let fetcher = FlakyFetcher::new(false);
        let mut view = mount(Arc::clone(&fetcher), "checkout");
        view.resolve().await;

        assert_eq!(view.retry(), ActionOutcome::Retried { attempt: 2 });
        view.resolve().await;
        assert_eq!(view.dispatch(Affordance::Retry), ActionOutcome::Retried { attempt: 3 });
        view.resolve().await;

        let node = view.render();
        let fallback = node.fallback().unwrap();
        assert_eq!(fallback.attempt.as_deref(), Some("Attempt 3 of 3"));
        assert!(!fallback.offers(Affordance::Retry));
        assert!(fallback.offers(Affordance::Reload));
        assert_eq!(view.retry(), ActionOutcome::RetryUnavailable);
        assert_eq!(view.attempts(), 2);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_recovers_once_fetch_succeeds() {
        let fetcher = FlakyFetcher::new(false);
        let mut view = mount(Arc::clone(&fetcher), "profile");
        view.resolve().await;
        assert!(view.is_failed());

        fetcher.healthy.store(true, Ordering::SeqCst);
        view.retry();
        view.resolve().await;

        assert!(!view.is_failed());
        assert_eq!(view.render(), ViewNode::markup("<main>profile</main>"));
    }

    #[tokio::test]
    async fn test_render_failure_uses_view_fallback_without_refetch() {
        let fetcher = FlakyFetcher::new(true);
        let mut view = mount(Arc::clone(&fetcher), "boom");
        view.resolve().await;

        let node = view.render();
        let fallback = node.fallback().unwrap();
        assert_eq!(fallback.title, Severity::Page.fallback_title());
        assert!(fallback.failure_id.is_some());
        assert!(fallback.offers(Affordance::GoBack));

        assert_eq!(view.retry(), ActionOutcome::Retried { attempt: 2 });
        assert!(!view.is_pending());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_healthy_view_ignores_retry() {
        let mut view = mount(FlakyFetcher::new(true), "home");
        view.resolve().await;

        assert_eq!(view.retry(), ActionOutcome::RetryUnavailable);
        assert_eq!(view.dispatch(Affordance::Reload), ActionOutcome::ReloadRequested);
        assert_eq!(view.dispatch(Affordance::GoBack), ActionOutcome::NavigateBack);
    }

    #[tokio::test]
    async fn test_for_path_rejects_unknown_route() {
        let loader = Arc::new(ModuleLoader::new(FlakyFetcher::new(true)));
        let routes = RouteTable::new().with_route("/orders/:id", "order-detail");

        let error = RetryableView::for_path(
            &routes,
            "/missing",
            Arc::clone(&loader),
            FailureReporter::development(),
            ViewOptions::default(),
        )
        .unwrap_err();
        assert_eq!(error, ResilienceError::UnknownRoute("/missing".to_string()));

        let view = RetryableView::for_path(
            &routes,
            "/orders/7",
            loader,
            FailureReporter::development(),
            ViewOptions::default(),
        )
        .unwrap();
        assert_eq!(view.module_id().as_str(), "order-detail");
    }
}
