//! Recycle Queue
//!
//! Multi-producer / single-consumer collection of [`DeletionTask`]s.
//! Any thread may push; only the device thread drains. Draining takes the
//! tasks queued at entry, so producers pushing concurrently are picked up
//! by the next drain instead of extending the current one.

use std::fmt;

use crate::context::GraphicsContext;
use crate::resource::{DeletionTask, Resource};

/// Cloneable handle to the deferred deletion queue.
#[derive(Clone)]
pub struct RecycleQueue {
    tx: flume::Sender<DeletionTask>,
    rx: flume::Receiver<DeletionTask>,
}

impl RecycleQueue {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    /// Queues a deletion. Tasks for absent handles are dropped.
    pub fn push(&self, task: DeletionTask) {
        if task.is_noop() {
            return;
        }
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.tx.send(task);
    }

    /// Clears the resource's handle now and queues the device deletion.
    pub fn recycle(&self, resource: &dyn Resource) {
        let task = resource.recycle();
        if !task.is_noop() {
            log::debug!("Recycling {} '{}' {}", resource.kind(), resource.label(), task.handle());
        }
        self.push(task);
    }

    /// Executes every task queued at entry. Device thread only.
    ///
    /// Returns the number of deletions issued.
    pub fn drain(&self, ctx: &mut GraphicsContext) -> usize {
        let snapshot = self.rx.len();
        let mut executed = 0;
        for task in self.rx.try_iter().take(snapshot) {
            task.execute(ctx);
            executed += 1;
        }
        executed
    }

    /// Number of deletions waiting for the device thread.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Default for RecycleQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecycleQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecycleQueue").field("pending", &self.pending()).finish()
    }
}
