//! # Render Model
//!
//! The minimal view vocabulary the resilience layer needs: a [`Component`]
//! that renders into a [`ViewNode`], and the structured fallbacks rendered in
//! place of failed or pending subtrees.
//!
//! Host renderers translate `ViewNode`s into real UI; the resilience layer only
//! decides *which* node is shown.

pub mod component;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::copy;

pub use component::{Component, FnComponent, RenderError};

/// Classification that governs fallback copy and whether retry is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Non-recoverable; fallback offers reload only
    Critical,
    /// A whole routed page failed
    Page,
    /// A section inside a page failed
    Component,
}

impl Severity {
    /// Whether fallbacks of this severity may offer a retry affordance
    pub fn allows_retry(&self) -> bool {
        !matches!(self, Self::Critical)
    }

    pub fn fallback_title(&self) -> &'static str {
        match self {
            Self::Critical => "Something went wrong",
            Self::Page => "This page couldn't be displayed",
            Self::Component => "This section couldn't be displayed",
        }
    }

    pub fn fallback_message(&self) -> &'static str {
        match self {
            Self::Critical => "A critical error occurred. Reloading the page should fix it.",
            Self::Page => "An unexpected error occurred while showing this page.",
            Self::Component => "Part of this page failed. The rest of the page still works.",
        }
    }

    pub fn loading_message(&self) -> &'static str {
        match self {
            Self::Critical | Self::Page => "Loading page...",
            Self::Component => "Loading component...",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Component
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Page => write!(f, "page"),
            Self::Component => write!(f, "component"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "page" => Ok(Self::Page),
            "component" => Ok(Self::Component),
            _ => Err(format!("Invalid severity: {s}")),
        }
    }
}

/// A user action offered by a fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affordance {
    Retry,
    Reload,
    GoBack,
}

impl Affordance {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Retry => copy::RETRY_LABEL,
            Self::Reload => copy::RELOAD_LABEL,
            Self::GoBack => copy::GO_BACK_LABEL,
        }
    }
}

/// Raw error detail, only ever attached in development builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub message: String,
    pub stack: Option<String>,
}

/// Structured fallback rendered in place of a failed subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackView {
    pub severity: Severity,
    pub title: String,
    pub message: String,
    /// `"Attempt k of N"` line, present for routed views
    pub attempt: Option<String>,
    pub affordances: Vec<Affordance>,
    pub details: Option<ErrorDetails>,
    pub failure_id: Option<String>,
}

impl FallbackView {
    pub fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
            attempt: None,
            affordances: Vec::new(),
            details: None,
            failure_id: None,
        }
    }

    pub fn with_affordance(mut self, affordance: Affordance) -> Self {
        if !self.affordances.contains(&affordance) {
            self.affordances.push(affordance);
        }
        self
    }

    pub fn offers(&self, affordance: Affordance) -> bool {
        self.affordances.contains(&affordance)
    }
}

/// Output of a render pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ViewNode {
    /// Host-defined markup produced by a healthy component
    Markup(String),
    /// Suspension indicator shown while a module is pending
    Loading { message: String },
    Fallback(FallbackView),
    Fragment(Vec<ViewNode>),
}

impl ViewNode {
    pub fn markup(content: impl Into<String>) -> Self {
        Self::Markup(content.into())
    }

    pub fn loading(message: impl Into<String>) -> Self {
        Self::Loading {
            message: message.into(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// First fallback found in this node, depth first
    pub fn fallback(&self) -> Option<&FallbackView> {
        match self {
            Self::Fallback(fallback) => Some(fallback),
            Self::Fragment(children) => children.iter().find_map(ViewNode::fallback),
            _ => None,
        }
    }
}
