#![allow(clippy::doc_markdown)] // Allow technical terms like UUID, YAML in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # View Resilience
//!
//! Client-side resilience layer for a routed, component-based UI: failure
//! boundaries that contain render errors, on-demand module loading with
//! single-flight caching, bounded user retry per routed view, predictive
//! preloading and time-on-view telemetry.
//!
//! ## Architecture
//!
//! ```text
//! PreloadScheduler ──preload──▶ ModuleLoader ◀──load── RetryableView
//!                                                         │
//!                                          FailureBoundary ┘──▶ FailureReporter
//! ```
//!
//! A render failure never crosses a [`boundary::FailureBoundary`], and a
//! rejected fetch never reaches a caller of [`loader::ModuleLoader`]: both are
//! turned into renderable values.
//!
//! ## Module Organization
//!
//! - [`view`] - Render model: components, view nodes, fallbacks
//! - [`boundary`] - Failure containment, reset and bounded retry
//! - [`loader`] - Single-flight module cache
//! - [`routing`] - Routed views and path resolution
//! - [`preload`] - Eager and hover-driven cache warming
//! - [`telemetry`] - Time-on-view reporting
//! - [`reporting`] - Failure reports and their sinks
//! - [`config`] - Layered YAML and environment configuration
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::FutureExt;
//! use view_resilience::config::ConfigManager;
//! use view_resilience::loader::{FnFetcher, ModuleId, ModuleLoader};
//! use view_resilience::preload::PreloadScheduler;
//! use view_resilience::reporting::FailureReporter;
//! use view_resilience::routing::{RetryableView, ViewOptions};
//! use view_resilience::view::FnComponent;
//!
//! # async fn example() -> view_resilience::Result<()> {
//! view_resilience::logging::init_structured_logging();
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//!
//! let loader = Arc::new(ModuleLoader::new(Arc::new(FnFetcher::new(|id: ModuleId| {
//!     async move { Ok(FnComponent::static_markup(id.to_string(), "<main/>")) }.boxed()
//! }))));
//! let scheduler = PreloadScheduler::from_config(Arc::clone(&loader), config);
//! scheduler.start(config.preload.eager.iter().map(String::as_str));
//!
//! let reporter = FailureReporter::new(config.environment, config.client.clone());
//! let mut view = RetryableView::for_path(
//!     scheduler.routes(),
//!     "/",
//!     loader,
//!     reporter,
//!     ViewOptions::from_config(config),
//! )?;
//! view.resolve().await;
//! println!("{:?}", view.render());
//! # Ok(())
//! # }
//! ```

pub mod boundary;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod loader;
pub mod logging;
pub mod preload;
pub mod reporting;
pub mod routing;
pub mod telemetry;
pub mod view;

pub use boundary::{BoundaryConfig, BoundaryState, FailureBoundary, FailureRecord, RetryOutcome};
pub use config::{ConfigManager, DeploymentEnvironment, ResilienceConfig};
pub use error::{ResilienceError, Result};
pub use events::{DocumentEventBus, PointerEvent};
pub use loader::{LoadState, LoadedModule, ModuleFetcher, ModuleId, ModuleLoader};
pub use preload::PreloadScheduler;
pub use reporting::{FailureReport, FailureReporter, ReportingSink};
pub use routing::{ActionOutcome, RetryableView, RouteTable, ViewOptions};
pub use telemetry::{AnalyticsSink, NavigationTelemetry, ViewTiming};
pub use view::{Affordance, Component, FallbackView, RenderError, Severity, ViewNode};
