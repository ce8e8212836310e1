//! # Routing
//!
//! The unit a host router mounts per navigation target, plus the path table
//! that maps URLs onto module identifiers.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use futures::FutureExt;
//! use view_resilience::loader::{FnFetcher, ModuleId, ModuleLoader};
//! use view_resilience::reporting::FailureReporter;
//! use view_resilience::routing::{RetryableView, RouteTable, ViewOptions};
//! use view_resilience::view::FnComponent;
//!
//! # async fn example() {
//! let loader = Arc::new(ModuleLoader::new(Arc::new(FnFetcher::new(|id: ModuleId| {
//!     async move { Ok(FnComponent::static_markup(id.to_string(), "<main/>")) }.boxed()
//! }))));
//! let routes = RouteTable::new().with_route("/orders/:id", "order-detail");
//!
//! let mut view = RetryableView::for_path(
//!     &routes,
//!     "/orders/42",
//!     loader,
//!     FailureReporter::development(),
//!     ViewOptions::default(),
//! )
//! .unwrap();
//! view.resolve().await;
//! assert!(!view.render().is_loading());
//! # }
//! ```

pub mod retryable_view;
pub mod route_table;

pub use retryable_view::{ActionOutcome, RetryableView, ViewOptions, ViewPhase};
pub use route_table::RouteTable;
