//! # Navigation Telemetry
//!
//! Measures time spent on each view and hands `(path, duration)` pairs to an
//! external analytics collaborator. Reporting runs on a detached task, so a
//! slow or failing sink never delays navigation or rendering.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::reporting::SinkError;

/// Time spent on one view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewTiming {
    pub path: String,
    pub duration_ms: u64,
}

/// External analytics collaborator
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record_view(&self, timing: ViewTiming) -> Result<(), SinkError>;
}

/// Pure observer of view changes
pub struct NavigationTelemetry {
    sink: Arc<dyn AnalyticsSink>,
    current: Option<(String, Instant)>,
}

impl NavigationTelemetry {
    pub fn new(sink: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            sink,
            current: None,
        }
    }

    pub fn current_path(&self) -> Option<&str> {
        self.current.as_ref().map(|(path, _)| path.as_str())
    }

    /// A view mounted or the path changed; reports the view being left.
    ///
    /// Entering the path already being timed is a no-op.
    pub fn enter(&mut self, path: impl Into<String>) -> Option<JoinHandle<()>> {
        let path = path.into();
        if self.current_path() == Some(path.as_str()) {
            return None;
        }

        let previous = self.current.replace((path, Instant::now()));
        previous.and_then(|(path, started)| self.report(path, started))
    }

    /// The view unmounted
    pub fn leave(&mut self) -> Option<JoinHandle<()>> {
        self.current
            .take()
            .and_then(|(path, started)| self.report(path, started))
    }

    fn report(&self, path: String, started: Instant) -> Option<JoinHandle<()>> {
        let timing = ViewTiming {
            path,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        debug!(path = %timing.path, duration_ms = timing.duration_ms, "View timing recorded");

        let Ok(runtime) = Handle::try_current() else {
            warn!(path = %timing.path, "No tokio runtime available, view timing dropped");
            return None;
        };

        let sink = Arc::clone(&self.sink);
        Some(runtime.spawn(async move {
            let path = timing.path.clone();
            if let Err(error) = sink.record_view(timing).await {
                warn!(path = %path, error = %error, "Failed to report view timing");
            }
        }))
    }
}

impl Drop for NavigationTelemetry {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl std::fmt::Debug for NavigationTelemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationTelemetry")
            .field("current_path", &self.current_path())
            .finish()
    }
}
