//! # Failure Reporting
//!
//! Delivers captured render failures to an external reporting collaborator.
//!
//! In development the report is printed through `tracing`; everywhere else it
//! is handed to a [`ReportingSink`] on a detached task. A sink failure is
//! logged once and swallowed: reporting never affects rendering.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::config::{ClientSettings, DeploymentEnvironment};
use crate::view::Severity;

/// Structured record of one captured failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub message: String,
    pub stack: Option<String>,
    pub component_trace: String,
    pub failure_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
    pub url: String,
    pub severity: Severity,
}

/// Error returned by an external sink
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{sink} sink failed: {reason}")]
pub struct SinkError {
    pub sink: String,
    pub reason: String,
}

impl SinkError {
    pub fn new(sink: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            reason: reason.into(),
        }
    }
}

/// External collaborator receiving failure reports
#[async_trait]
pub trait ReportingSink: Send + Sync {
    async fn report(&self, report: FailureReport) -> Result<(), SinkError>;
}

/// Routes failure reports according to the deployment environment
#[derive(Clone)]
pub struct FailureReporter {
    environment: DeploymentEnvironment,
    client: ClientSettings,
    sink: Option<Arc<dyn ReportingSink>>,
}

impl FailureReporter {
    pub fn new(environment: DeploymentEnvironment, client: ClientSettings) -> Self {
        Self {
            environment,
            client,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportingSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Reporter that only prints, for development and tests
    pub fn development() -> Self {
        Self::new(DeploymentEnvironment::Development, ClientSettings::default())
    }

    pub fn environment(&self) -> DeploymentEnvironment {
        self.environment
    }

    pub fn client(&self) -> &ClientSettings {
        &self.client
    }

    /// Hand a report off without blocking the caller.
    ///
    /// Returns the delivery task when one was spawned.
    pub fn dispatch(&self, report: FailureReport) -> Option<JoinHandle<()>> {
        if self.environment.is_development() {
            Self::print(&report);
            return None;
        }

        let Some(sink) = self.sink.clone() else {
            Self::print(&report);
            return None;
        };

        match Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(Self::deliver(sink, report))),
            Err(_) => {
                warn!(
                    failure_id = %report.failure_id,
                    "No runtime available for failure reporting, printing locally"
                );
                Self::print(&report);
                None
            }
        }
    }

    /// Deliver a report to the sink, swallowing and logging any failure
    pub async fn deliver(sink: Arc<dyn ReportingSink>, report: FailureReport) {
        let failure_id = report.failure_id.clone();
        if let Err(sink_error) = sink.report(report).await {
            warn!(
                failure_id = %failure_id,
                error = %sink_error,
                "Failure report could not be delivered"
            );
        }
    }

    fn print(report: &FailureReport) {
        error!(
            failure_id = %report.failure_id,
            severity = %report.severity,
            message = %report.message,
            stack = report.stack.as_deref(),
            component_trace = %report.component_trace,
            url = %report.url,
            timestamp = %report.timestamp.to_rfc3339(),
            "Render failure captured"
        );
    }
}

impl fmt::Debug for FailureReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureReporter")
            .field("environment", &self.environment)
            .field("client", &self.client)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
