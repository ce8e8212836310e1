use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::view::{RenderError, Severity};

/// Observable state of a failure boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryState {
    /// Rendering its subtree normally
    Stable,
    /// Showing the fallback in place of its subtree
    Failed,
}

impl fmt::Display for BoundaryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Error value captured from a failing subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedError {
    pub message: String,
    pub stack: Option<String>,
    pub component_trace: String,
    pub captured_at: DateTime<Utc>,
}

impl From<RenderError> for CapturedError {
    fn from(error: RenderError) -> Self {
        Self {
            component_trace: error.component_trace(),
            message: error.message,
            stack: error.stack,
            captured_at: Utc::now(),
        }
    }
}

/// Failure state owned by one boundary instance.
///
/// `has_failed == false` implies `error == None` and an empty `failure_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub has_failed: bool,
    pub error: Option<CapturedError>,
    pub failure_id: String,
    pub retry_count: u32,
}

impl FailureRecord {
    pub fn state(&self) -> BoundaryState {
        if self.has_failed {
            BoundaryState::Failed
        } else {
            BoundaryState::Stable
        }
    }

    pub(crate) fn fail(&mut self, error: CapturedError, failure_id: String) {
        self.has_failed = true;
        self.error = Some(error);
        self.failure_id = failure_id;
    }

    /// Clear the failure; `retry_count` is left to the caller
    pub(crate) fn clear(&mut self) {
        self.has_failed = false;
        self.error = None;
        self.failure_id.clear();
    }

    pub fn is_consistent(&self) -> bool {
        self.has_failed || (self.error.is_none() && self.failure_id.is_empty())
    }
}

/// Context handed to `on_failure` hooks alongside the captured error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureContext {
    pub boundary: String,
    pub severity: Severity,
    pub failure_id: String,
    pub retry_count: u32,
    pub url: String,
}
