//! Live comm-task registry.
//!
//! The registry is the only bridge between worker threads and comm tasks:
//! a job stores the [`TaskId`] of its originating connection and resolves
//! it here at handoff time. A missing entry means the connection is gone
//! and the caller must discard its payload; there is no dangling reference
//! to race against.

use super::signal::TaskSignal;
use crate::error::ServerError;
use crate::handler::Handler;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::fmt;
use tokio::sync::mpsc;
use tracing::trace;

/// Identity of a comm task, unique for the process lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Placeholder id used by synthetic requests in tests.
    pub fn invalid() -> Self {
        Self(0)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry of live comm tasks keyed by [`TaskId`].
///
/// Entries are inserted when a connection is mounted on its event loop and
/// removed when the task tears down; senders left in dropped entries fail
/// cleanly on use.
pub struct TaskRegistry {
    tasks: DashMap<TaskId, mpsc::UnboundedSender<TaskSignal>>,
    next_id: AtomicU64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh task id.
    pub fn allocate_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a task's signal sender.
    pub fn insert(&self, id: TaskId, sender: mpsc::UnboundedSender<TaskSignal>) {
        self.tasks.insert(id, sender);
    }

    /// Removes a task; later sends to it fail.
    pub fn remove(&self, id: TaskId) {
        self.tasks.remove(&id);
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Moves a finished handler back to its comm task.
    ///
    /// Returns false if the task is gone; the handler (and its response)
    /// is dropped by the caller in that case.
    pub fn send_response(&self, id: TaskId, handler: Box<dyn Handler>) -> bool {
        match self.tasks.get(&id) {
            Some(sender) => sender.send(TaskSignal::Response(handler)).is_ok(),
            None => {
                trace!(task = %id, "response handoff to vanished task discarded");
                false
            }
        }
    }

    /// Enqueues a chunk onto the task's write queue.
    pub fn send_chunk(&self, id: TaskId, data: Bytes) -> Result<(), ServerError> {
        let signal = if data.is_empty() {
            TaskSignal::ChunkEnd
        } else {
            TaskSignal::Chunk(data)
        };

        self.tasks
            .get(&id)
            .and_then(|sender| sender.send(signal).ok())
            .ok_or_else(|| ServerError::NotFound(format!("task {}", id)))
    }

    /// Asks a task to close at the next opportunity.
    pub fn close(&self, id: TaskId) {
        if let Some(sender) = self.tasks.get(&id) {
            let _ = sender.send(TaskSignal::Close);
        }
    }

    /// Asks every live task to close. Used during shutdown.
    pub fn close_all(&self) {
        for entry in self.tasks.iter() {
            let _ = entry.value().send(TaskSignal::Close);
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_unique_ids() {
        let registry = TaskRegistry::new();
        let a = registry.allocate_id();
        let b = registry.allocate_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_send_chunk_to_unknown_task() {
        let registry = TaskRegistry::new();
        let id = registry.allocate_id();
        assert!(registry.send_chunk(id, Bytes::from_static(b"x")).is_err());
    }

    #[tokio::test]
    async fn test_send_chunk_roundtrip() {
        let registry = TaskRegistry::new();
        let id = registry.allocate_id();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.insert(id, tx);

        registry.send_chunk(id, Bytes::from_static(b"data")).unwrap();
        registry.send_chunk(id, Bytes::new()).unwrap();

        assert!(matches!(rx.recv().await, Some(TaskSignal::Chunk(d)) if d == "data"));
        assert!(matches!(rx.recv().await, Some(TaskSignal::ChunkEnd)));
    }

    #[tokio::test]
    async fn test_remove_makes_sends_fail() {
        let registry = TaskRegistry::new();
        let id = registry.allocate_id();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.insert(id, tx);
        assert!(registry.contains(id));

        registry.remove(id);
        assert!(!registry.contains(id));
        assert!(registry.send_chunk(id, Bytes::from_static(b"x")).is_err());
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = TaskRegistry::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let id = registry.allocate_id();
            let (tx, rx) = mpsc::unbounded_channel();
            registry.insert(id, tx);
            receivers.push(rx);
        }

        registry.close_all();
        for mut rx in receivers {
            assert!(matches!(rx.recv().await, Some(TaskSignal::Close)));
        }
    }
}
