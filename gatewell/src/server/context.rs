//! Shared server state reachable from any thread.
//!
//! The context bundles the pieces that dispatcher workers and handlers need
//! without holding the full [`HttpServer`]: the live task registry, the
//! async job registry, and the chunked-streaming subscriptions.

use crate::async_jobs::AsyncJobManager;
use crate::comm::{TaskId, TaskRegistry};
use crate::config::ConfigFile;
use crate::error::ServerError;
use bytes::Bytes;
use dashmap::DashSet;
use std::sync::Arc;
use tracing::trace;

/// Cross-thread server state.
pub struct ServerContext {
    registry: TaskRegistry,
    jobs: Arc<AsyncJobManager>,
    /// Tasks currently subscribed as chunked producers.
    chunked: DashSet<TaskId>,
    max_chunked_tasks: usize,
}

impl ServerContext {
    /// Builds the context from the loaded configuration.
    ///
    /// Starts the async job registry (including its sweeper thread).
    pub fn new(config: &ConfigFile) -> Arc<Self> {
        Arc::new(Self {
            registry: TaskRegistry::new(),
            jobs: AsyncJobManager::start(config.async_jobs.ttl, config.async_jobs.capacity),
            chunked: DashSet::new(),
            max_chunked_tasks: config.http.max_chunked_tasks,
        })
    }

    /// The live comm-task registry.
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// The async job registry.
    pub fn jobs(&self) -> &Arc<AsyncJobManager> {
        &self.jobs
    }

    /// Subscribes a task as a chunked producer.
    ///
    /// Bounded by `max_chunked_tasks`; a full table rejects the
    /// subscription and the handler should fail its response instead.
    pub fn register_chunked_task(&self, id: TaskId) -> Result<(), ServerError> {
        if self.chunked.len() >= self.max_chunked_tasks {
            return Err(ServerError::Conflict(format!(
                "chunked task limit ({}) reached",
                self.max_chunked_tasks
            )));
        }
        self.chunked.insert(id);
        trace!(task = %id, "chunked task registered");
        Ok(())
    }

    /// Drops a task's chunked subscription.
    pub fn unregister_chunked_task(&self, id: TaskId) {
        if self.chunked.remove(&id).is_some() {
            trace!(task = %id, "chunked task unregistered");
        }
    }

    /// Number of active chunked subscriptions.
    pub fn chunked_task_count(&self) -> usize {
        self.chunked.len()
    }

    /// Sends one chunk to a subscribed task, from any thread.
    ///
    /// An empty payload terminates the stream. Chunks are delivered in
    /// enqueue order onto the task's write queue.
    pub fn send_chunk(&self, id: TaskId, data: Bytes) -> Result<(), ServerError> {
        if !self.chunked.contains(&id) {
            return Err(ServerError::NotFound(format!("chunked task {}", id)));
        }

        let finished = data.is_empty();
        self.registry.send_chunk(id, data)?;
        if finished {
            self.unregister_chunked_task(id);
        }
        Ok(())
    }

    /// Drops all state owned by the context during shutdown.
    pub fn shutdown(&self) {
        self.chunked.clear();
        self.registry.close_all();
        self.jobs.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::TaskSignal;
    use tokio::sync::mpsc;

    fn context() -> Arc<ServerContext> {
        let mut config = ConfigFile::default();
        config.http.max_chunked_tasks = 2;
        ServerContext::new(&config)
    }

    #[tokio::test]
    async fn test_chunked_subscription_limit() {
        let ctx = context();
        let a = ctx.registry().allocate_id();
        let b = ctx.registry().allocate_id();
        let c = ctx.registry().allocate_id();

        ctx.register_chunked_task(a).unwrap();
        ctx.register_chunked_task(b).unwrap();
        assert!(ctx.register_chunked_task(c).is_err());

        ctx.jobs().shutdown();
    }

    #[tokio::test]
    async fn test_send_chunk_requires_subscription() {
        let ctx = context();
        let id = ctx.registry().allocate_id();
        let (tx, _rx) = mpsc::unbounded_channel();
        ctx.registry().insert(id, tx);

        assert!(ctx.send_chunk(id, Bytes::from_static(b"x")).is_err());

        ctx.jobs().shutdown();
    }

    #[tokio::test]
    async fn test_empty_chunk_terminates_subscription() {
        let ctx = context();
        let id = ctx.registry().allocate_id();
        let (tx, mut rx) = mpsc::unbounded_channel();
        ctx.registry().insert(id, tx);
        ctx.register_chunked_task(id).unwrap();

        ctx.send_chunk(id, Bytes::from_static(b"abc")).unwrap();
        ctx.send_chunk(id, Bytes::new()).unwrap();
        assert_eq!(ctx.chunked_task_count(), 0);

        assert!(matches!(rx.recv().await, Some(TaskSignal::Chunk(_))));
        assert!(matches!(rx.recv().await, Some(TaskSignal::ChunkEnd)));

        ctx.jobs().shutdown();
    }
}
