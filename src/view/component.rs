use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::ViewNode;

/// A unit of UI that may fail while mounting or rendering.
///
/// Implementations may either return a [`RenderError`] or panic; failure
/// boundaries treat both the same way.
pub trait Component: Send + Sync + fmt::Debug {
    /// Human readable name, used in component traces and fallback copy
    fn name(&self) -> &str;

    /// Lifecycle hook run once per mount, before the first render
    fn mount(&self) -> Result<(), RenderError> {
        Ok(())
    }

    fn render(&self) -> Result<ViewNode, RenderError>;
}

/// Error raised by a component during render or lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    pub message: String,
    pub stack: Option<String>,
    /// Component names from the failing component outward
    pub trace: Vec<String>,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            trace: Vec::new(),
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Record that the error crossed the named component
    pub fn within(mut self, component: impl Into<String>) -> Self {
        self.trace.push(component.into());
        self
    }

    /// Build an error from a caught panic payload
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self::new(message).with_stack("panicked during render")
    }

    /// Component trace formatted one frame per line
    pub fn component_trace(&self) -> String {
        self.trace
            .iter()
            .map(|frame| format!("    in {frame}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RenderError {}

/// Run a component callback, converting panics into [`RenderError`]s.
pub(crate) fn catch_render<T>(
    component: &str,
    operation: impl FnOnce() -> Result<T, RenderError>,
) -> Result<T, RenderError> {
    match panic::catch_unwind(AssertUnwindSafe(operation)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(error.within(component)),
        Err(payload) => Err(RenderError::from_panic(payload).within(component)),
    }
}

type RenderFn = dyn Fn() -> Result<ViewNode, RenderError> + Send + Sync;

/// Closure-backed component, handy for hosts and tests
pub struct FnComponent {
    name: String,
    render: Box<RenderFn>,
}

impl FnComponent {
    pub fn new<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn() -> Result<ViewNode, RenderError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            render: Box::new(render),
        }
    }

    /// Convenience constructor returning the component ready for mounting
    pub fn shared<F>(name: impl Into<String>, render: F) -> Arc<dyn Component>
    where
        F: Fn() -> Result<ViewNode, RenderError> + Send + Sync + 'static,
    {
        Arc::new(Self::new(name, render))
    }

    /// A component that always renders the given markup
    pub fn static_markup(name: impl Into<String>, markup: impl Into<String>) -> Arc<dyn Component> {
        let markup = markup.into();
        Self::shared(name, move || Ok(ViewNode::markup(markup.clone())))
    }
}

impl fmt::Debug for FnComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComponent")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Component for FnComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self) -> Result<ViewNode, RenderError> {
        (self.render)()
    }
}
