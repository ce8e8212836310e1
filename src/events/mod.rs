//! Document-level events observed by the resilience layer.

pub mod publisher;

pub use publisher::{DocumentEventBus, PointerEvent};
