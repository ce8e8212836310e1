//! # Failure Boundary
//!
//! Makes one subtree crash-proof: any error or panic raised while the subtree
//! mounts or renders is captured, reported, and replaced by a fallback view.
//! Siblings and ancestors keep rendering.
//!
//! ## State machine
//!
//! ```text
//!            descendant raises
//!   Stable ───────────────────▶ Failed
//!     ▲                            │
//!     └────────────────────────────┘
//!      reset() | retry() | child change | reset keys change
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use view_resilience::boundary::{BoundaryConfig, FailureBoundary};
//! use view_resilience::reporting::FailureReporter;
//! use view_resilience::view::{FnComponent, RenderError, Severity};
//!
//! let child = FnComponent::shared("Cart", || Err(RenderError::new("boom")));
//! let boundary = FailureBoundary::new(
//!     BoundaryConfig::new("cart", Severity::Component),
//!     child,
//!     FailureReporter::development(),
//! );
//!
//! let node = boundary.render();
//! assert!(node.fallback().is_some());
//! assert!(boundary.has_failed());
//! ```

pub mod record;

use parking_lot::Mutex;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BoundarySettings;
use crate::constants::{copy, DEFAULT_MAX_RETRIES};
use crate::lifecycle::ScopedTask;
use crate::logging::{log_boundary_operation, log_error};
use crate::reporting::{FailureReport, FailureReporter};
use crate::view::component::catch_render;
use crate::view::{Affordance, Component, ErrorDetails, FallbackView, RenderError, Severity, ViewNode};

pub use record::{BoundaryState, CapturedError, FailureContext, FailureRecord};

/// A value watched by a boundary; any element-wise change resets it
pub type ResetKey = Value;

/// Callback invoked after each capture
pub type FailureHook = Arc<dyn Fn(&CapturedError, &FailureContext) + Send + Sync>;

/// Configuration supplied by the composing application
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryConfig {
    /// Name used in logs and failure contexts
    pub name: String,
    pub severity: Severity,
    /// Reset when the child reference changes while failed
    pub reset_on_child_change: bool,
    pub max_retries: u32,
    /// Automatic retry delay after a capture; `None` leaves retry to the user
    pub retry_delay: Option<Duration>,
    /// Path of the guarded view, appended to the client origin in reports
    pub location: String,
}

impl BoundaryConfig {
    pub fn new(name: impl Into<String>, severity: Severity) -> Self {
        Self {
            name: name.into(),
            severity,
            reset_on_child_change: false,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: None,
            location: "/".to_string(),
        }
    }

    /// Build from loaded settings
    pub fn from_settings(
        name: impl Into<String>,
        severity: Severity,
        settings: &BoundarySettings,
    ) -> Self {
        Self {
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay(),
            ..Self::new(name, severity)
        }
    }

    pub fn reset_on_child_change(mut self, enabled: bool) -> Self {
        self.reset_on_child_change = enabled;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

/// Why a boundary went back to `Stable`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    Explicit,
    Retry,
    ChildChanged,
    KeysChanged,
}

impl ResetCause {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Retry => "retry",
            Self::ChildChanged => "child_changed",
            Self::KeysChanged => "reset_keys_changed",
        }
    }
}

/// Result of a [`FailureBoundary::retry`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Boundary reset; `retry_count` is the new count
    Retried { retry_count: u32 },
    /// Budget used up, boundary stays failed
    Exhausted,
    /// Severity does not allow retry
    NotAllowed,
    /// Nothing to retry
    NotFailed,
}

struct BoundaryInner {
    config: BoundaryConfig,
    record: FailureRecord,
    child: Arc<dyn Component>,
    reset_keys: Vec<ResetKey>,
    needs_mount: bool,
    /// Set by a reset; the next successful render clears the retry count
    awaiting_recovery: bool,
    mounted: bool,
}

impl BoundaryInner {
    fn can_retry(&self) -> bool {
        self.config.severity.allows_retry() && self.record.retry_count < self.config.max_retries
    }

    fn reset(&mut self, cause: ResetCause) -> bool {
        if !self.record.has_failed {
            return false;
        }

        let failure_id = std::mem::take(&mut self.record.failure_id);
        self.record.clear();
        self.needs_mount = true;
        self.awaiting_recovery = true;

        log_boundary_operation(
            cause.as_str(),
            &self.config.name,
            Some(&failure_id),
            self.record.retry_count,
            "reset",
        );
        true
    }

    fn retry(&mut self) -> RetryOutcome {
        if !self.record.has_failed {
            return RetryOutcome::NotFailed;
        }
        if !self.config.severity.allows_retry() {
            return RetryOutcome::NotAllowed;
        }
        if self.record.retry_count >= self.config.max_retries {
            debug!(
                boundary = %self.config.name,
                retry_count = self.record.retry_count,
                "Retry budget exhausted"
            );
            return RetryOutcome::Exhausted;
        }

        self.reset(ResetCause::Retry);
        self.record.retry_count += 1;
        RetryOutcome::Retried {
            retry_count: self.record.retry_count,
        }
    }
}

/// Guards one subtree and renders a fallback when it fails
pub struct FailureBoundary {
    inner: Arc<Mutex<BoundaryInner>>,
    reporter: FailureReporter,
    on_failure: Option<FailureHook>,
    retry_timer: Mutex<Option<ScopedTask>>,
}

impl FailureBoundary {
    pub fn new(
        config: BoundaryConfig,
        child: Arc<dyn Component>,
        reporter: FailureReporter,
    ) -> Self {
        debug!(
            boundary = %config.name,
            severity = %config.severity,
            child = %child.name(),
            "Failure boundary mounted"
        );

        Self {
            inner: Arc::new(Mutex::new(BoundaryInner {
                config,
                record: FailureRecord::default(),
                child,
                reset_keys: Vec::new(),
                needs_mount: true,
                awaiting_recovery: false,
                mounted: true,
            })),
            reporter,
            on_failure: None,
            retry_timer: Mutex::new(None),
        }
    }

    pub fn with_on_failure(mut self, hook: FailureHook) -> Self {
        self.on_failure = Some(hook);
        self
    }

    pub fn with_reset_keys(self, keys: Vec<ResetKey>) -> Self {
        self.inner.lock().reset_keys = keys;
        self
    }

    pub fn state(&self) -> BoundaryState {
        self.inner.lock().record.state()
    }

    pub fn has_failed(&self) -> bool {
        self.inner.lock().record.has_failed
    }

    /// Snapshot of the failure record
    pub fn record(&self) -> FailureRecord {
        self.inner.lock().record.clone()
    }

    pub fn retry_count(&self) -> u32 {
        self.inner.lock().record.retry_count
    }

    pub fn can_retry(&self) -> bool {
        self.inner.lock().can_retry()
    }

    pub fn name(&self) -> String {
        self.inner.lock().config.name.clone()
    }

    /// Render the subtree, or the fallback while failed.
    ///
    /// A failure raised during this pass is captured before returning, so the
    /// returned node is already the fallback. An unmounted boundary renders an
    /// empty fragment without touching its child.
    pub fn render(&self) -> ViewNode {
        let (child, needs_mount) = {
            let inner = self.inner.lock();
            if !inner.mounted {
                return ViewNode::Fragment(Vec::new());
            }
            if inner.record.has_failed {
                return ViewNode::Fallback(self.fallback_for(&inner));
            }
            (Arc::clone(&inner.child), inner.needs_mount)
        };

        let outcome = catch_render(child.name(), || {
            if needs_mount {
                child.mount()?;
            }
            child.render()
        });

        match outcome {
            Ok(node) => {
                let mut inner = self.inner.lock();
                if Arc::ptr_eq(&inner.child, &child) {
                    inner.needs_mount = false;
                }
                if inner.awaiting_recovery {
                    inner.awaiting_recovery = false;
                    inner.record.retry_count = 0;
                    info!(boundary = %inner.config.name, "Boundary recovered");
                }
                node
            }
            Err(error) => {
                self.capture(error);
                self.fallback()
                    .map(ViewNode::Fallback)
                    .unwrap_or_else(|| ViewNode::Fragment(Vec::new()))
            }
        }
    }

    /// The fallback this boundary shows, if it is failed
    pub fn fallback(&self) -> Option<FallbackView> {
        let inner = self.inner.lock();
        inner
            .record
            .has_failed
            .then(|| self.fallback_for(&inner))
    }

    fn fallback_for(&self, inner: &BoundaryInner) -> FallbackView {
        let severity = inner.config.severity;
        let mut fallback = FallbackView::new(
            severity,
            severity.fallback_title(),
            severity.fallback_message(),
        );
        fallback.failure_id = Some(inner.record.failure_id.clone());

        if inner.can_retry() {
            fallback = fallback.with_affordance(Affordance::Retry);
        } else if severity.allows_retry() {
            fallback.message = copy::RETRIES_EXHAUSTED.to_string();
        }
        fallback = fallback.with_affordance(Affordance::Reload);

        if self.reporter.environment().is_development() {
            fallback.details = inner.record.error.as_ref().map(|error| ErrorDetails {
                message: error.message.clone(),
                stack: error.stack.clone(),
            });
        }

        fallback
    }

    /// Capture a failure raised by a descendant.
    ///
    /// Never panics; a capture while already failed is ignored.
    pub fn capture(&self, error: RenderError) {
        let (captured, context, auto_retry) = {
            let mut inner = self.inner.lock();
            if !inner.mounted {
                debug!(boundary = %inner.config.name, "Capture after unmount ignored");
                return;
            }
            if inner.record.has_failed {
                debug!(
                    boundary = %inner.config.name,
                    error = %error,
                    "Boundary already failed, capture ignored"
                );
                return;
            }

            let captured = CapturedError::from(error);
            let failure_id = Uuid::new_v4().to_string();
            inner.record.fail(captured.clone(), failure_id.clone());
            inner.awaiting_recovery = false;

            let context = FailureContext {
                boundary: inner.config.name.clone(),
                severity: inner.config.severity,
                failure_id,
                retry_count: inner.record.retry_count,
                url: format!("{}{}", self.reporter.client().origin, inner.config.location),
            };
            let auto_retry = inner.config.retry_delay.filter(|_| inner.can_retry());
            (captured, context, auto_retry)
        };

        warn!(
            boundary = %context.boundary,
            failure_id = %context.failure_id,
            severity = %context.severity,
            error = %captured.message,
            "Render failure captured by boundary"
        );

        self.reporter.dispatch(FailureReport {
            message: captured.message.clone(),
            stack: captured.stack.clone(),
            component_trace: captured.component_trace.clone(),
            failure_id: context.failure_id.clone(),
            timestamp: captured.captured_at,
            user_agent: self.reporter.client().user_agent.clone(),
            url: context.url.clone(),
            severity: context.severity,
        });

        if let Some(hook) = &self.on_failure {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook(&captured, &context))) {
                log_error(
                    &context.boundary,
                    "on_failure",
                    &RenderError::from_panic(payload).message,
                    Some(&context.failure_id),
                );
            }
        }

        if let Some(delay) = auto_retry {
            self.schedule_retry(delay);
        }
    }

    /// Return to `Stable`. No-op when already stable.
    pub fn reset(&self) -> bool {
        let reset = self.inner.lock().reset(ResetCause::Explicit);
        if reset {
            self.cancel_retry_timer();
        }
        reset
    }

    /// Reset and consume one unit of retry budget
    pub fn retry(&self) -> RetryOutcome {
        let outcome = self.inner.lock().retry();
        if matches!(outcome, RetryOutcome::Retried { .. }) {
            self.cancel_retry_timer();
        }
        outcome
    }

    /// Replace the guarded child.
    ///
    /// Identity is the `Arc` pointer: a structurally equal but newly allocated
    /// child counts as a change.
    pub fn set_child(&self, child: Arc<dyn Component>) -> bool {
        let reset = {
            let mut inner = self.inner.lock();
            if Arc::ptr_eq(&inner.child, &child) {
                return false;
            }
            inner.child = child;
            inner.needs_mount = true;
            inner.config.reset_on_child_change && inner.reset(ResetCause::ChildChanged)
        };
        if reset {
            self.cancel_retry_timer();
        }
        reset
    }

    /// Replace the watched reset keys, resetting a failed boundary on change
    pub fn set_reset_keys(&self, keys: Vec<ResetKey>) -> bool {
        let reset = {
            let mut inner = self.inner.lock();
            let changed = inner.reset_keys.len() != keys.len()
                || inner.reset_keys.iter().zip(&keys).any(|(old, new)| old != new);
            inner.reset_keys = keys;
            changed && inner.reset(ResetCause::KeysChanged)
        };
        if reset {
            self.cancel_retry_timer();
        }
        reset
    }

    /// Arm a boundary-driven retry after `delay`, replacing any armed timer
    pub fn schedule_retry(&self, delay: Duration) -> bool {
        let weak: Weak<Mutex<BoundaryInner>> = Arc::downgrade(&self.inner);
        let task = ScopedTask::after("boundary_retry", delay, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut inner = inner.lock();
            if !inner.mounted {
                return;
            }
            let outcome = inner.retry();
            debug!(boundary = %inner.config.name, ?outcome, "Scheduled retry fired");
        });

        let armed = task.is_some();
        *self.retry_timer.lock() = task;
        armed
    }

    pub fn has_pending_retry(&self) -> bool {
        self.retry_timer
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn cancel_retry_timer(&self) {
        if let Some(task) = self.retry_timer.lock().take() {
            task.cancel();
        }
    }

    /// Tear down: cancel timers and ignore any later capture
    pub fn unmount(&self) {
        self.cancel_retry_timer();
        let mut inner = self.inner.lock();
        inner.mounted = false;
        debug!(boundary = %inner.config.name, "Failure boundary unmounted");
    }
}

impl std::fmt::Debug for FailureBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("FailureBoundary")
            .field("config", &inner.config)
            .field("record", &inner.record)
            .field("child", &inner.child.name())
            .finish()
    }
}
