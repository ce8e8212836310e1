use std::sync::Arc;

use super::fetcher::ModuleId;
use crate::view::{Affordance, Component, FallbackView, RenderError, Severity, ViewNode};

/// Component substituted for a module whose fetch was rejected.
///
/// Rendering it never fails; it shows a generic message and a full-page
/// reload affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailurePlaceholder {
    name: String,
    module: ModuleId,
    reason: String,
}

impl LoadFailurePlaceholder {
    pub fn new(module: ModuleId, reason: impl Into<String>) -> Self {
        Self {
            name: format!("LoadFailure({module})"),
            module,
            reason: reason.into(),
        }
    }

    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// Rejection reason, kept for logs; not shown to users
    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn fallback(&self) -> FallbackView {
        FallbackView::new(
            Severity::Page,
            format!("Failed to load {}", self.module),
            "Check your connection and reload the page.",
        )
        .with_affordance(Affordance::Reload)
    }
}

impl Component for LoadFailurePlaceholder {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self) -> Result<ViewNode, RenderError> {
        Ok(ViewNode::Fallback(self.fallback()))
    }
}

/// Outcome of a module load; always renderable
#[derive(Debug, Clone)]
pub enum LoadedModule {
    Ready(Arc<dyn Component>),
    Failed(Arc<LoadFailurePlaceholder>),
}

impl LoadedModule {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The component to mount: the module itself or its failure placeholder
    pub fn component(&self) -> Arc<dyn Component> {
        match self {
            Self::Ready(component) => Arc::clone(component),
            Self::Failed(placeholder) => Arc::clone(placeholder) as Arc<dyn Component>,
        }
    }
}
