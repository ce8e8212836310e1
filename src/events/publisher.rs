use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::constants::DOCUMENT_EVENT_CAPACITY;

/// Pointer moved over an element of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// `href` of the nearest enclosing link, if any
    pub href: Option<String>,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl PointerEvent {
    pub fn over_link(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            occurred_at: chrono::Utc::now(),
        }
    }

    pub fn over_element() -> Self {
        Self {
            href: None,
            occurred_at: chrono::Utc::now(),
        }
    }
}

/// Document-level event bus; hosts publish, listeners subscribe
#[derive(Debug, Clone)]
pub struct DocumentEventBus {
    sender: broadcast::Sender<PointerEvent>,
}

impl DocumentEventBus {
    /// Create a new bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a pointer event.
    ///
    /// Returns the number of listeners that received it; publishing with no
    /// listener attached is not an error.
    pub fn publish(&self, event: PointerEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PointerEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active listeners
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for DocumentEventBus {
    fn default() -> Self {
        Self::new(DOCUMENT_EVENT_CAPACITY)
    }
}
