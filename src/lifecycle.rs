//! Scoped background work.
//!
//! Every timer or listener a component starts is held in a [`ScopedTask`], so
//! teardown aborts it on every exit path, including drop.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Owns a spawned tokio task and aborts it when dropped
#[derive(Debug)]
pub struct ScopedTask {
    label: &'static str,
    handle: JoinHandle<()>,
}

impl ScopedTask {
    /// Spawn `future` on the current runtime.
    ///
    /// Returns `None` when called outside a tokio runtime.
    pub fn spawn<F>(label: &'static str, future: F) -> Option<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            warn!(task = label, "No tokio runtime available, task not started");
            return None;
        };

        Some(Self {
            label,
            handle: runtime.spawn(future),
        })
    }

    /// Run `action` once after `delay`
    pub fn after<F>(label: &'static str, delay: Duration, action: F) -> Option<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Self::spawn(label, async move {
            tokio::time::sleep(delay).await;
            action();
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the task now
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            debug!(task = self.label, "Aborting scoped task");
            self.handle.abort();
        }
    }
}
