//! Named queue collection and job routing.

use super::job::ServerJob;
use super::queue::{DispatcherQueue, QueueStats};
use crate::config::DispatcherSettings;
use crate::error::ServerError;
use crate::handler::STANDARD_QUEUE;
use crate::monitor::MonitorService;
use crate::server::ServerContext;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// The dispatcher: a set of named bounded queues with worker pools.
///
/// A job's target queue is selected by its handler; unknown queue names
/// fall back to the standard queue with a warning rather than dropping
/// the request.
pub struct Dispatcher {
    queues: HashMap<String, Arc<DispatcherQueue>>,
}

impl Dispatcher {
    /// Starts all configured queues and their workers.
    ///
    /// A standard queue always exists, even if the configuration omits it.
    pub fn start(
        settings: &DispatcherSettings,
        ctx: Arc<ServerContext>,
        monitor: Arc<MonitorService>,
    ) -> Arc<Self> {
        let mut queues = HashMap::new();

        for queue in &settings.queues {
            queues.insert(
                queue.name.clone(),
                DispatcherQueue::start(
                    &queue.name,
                    queue.size,
                    queue.threads,
                    Arc::clone(&ctx),
                    Arc::clone(&monitor),
                ),
            );
        }

        if !queues.contains_key(STANDARD_QUEUE) {
            warn!("no standard queue configured, creating one with defaults");
            queues.insert(
                STANDARD_QUEUE.to_string(),
                DispatcherQueue::start(
                    STANDARD_QUEUE,
                    crate::config::DEFAULT_QUEUE_SIZE,
                    crate::config::DEFAULT_QUEUE_THREADS,
                    ctx,
                    monitor,
                ),
            );
        }

        info!(queues = queues.len(), "dispatcher started");
        Arc::new(Self { queues })
    }

    /// Submits a job to the queue its handler selected.
    pub fn submit(&self, job: ServerJob) -> Result<(), ServerError> {
        let queue = match self.queues.get(job.queue_name()) {
            Some(queue) => queue,
            None => {
                warn!(
                    queue = job.queue_name(),
                    handler = job.handler_name(),
                    "unknown queue, routing to standard"
                );
                self.queues
                    .get(STANDARD_QUEUE)
                    .ok_or(ServerError::ShuttingDown)?
            }
        };

        queue.try_submit(job)
    }

    /// Looks up a queue by name.
    pub fn queue(&self, name: &str) -> Option<&Arc<DispatcherQueue>> {
        self.queues.get(name)
    }

    /// Counters for every queue.
    pub fn stats(&self) -> HashMap<String, QueueStats> {
        self.queues
            .iter()
            .map(|(name, queue)| (name.clone(), queue.stats()))
            .collect()
    }

    /// Drains all queues, then joins their workers.
    pub fn shutdown(&self) {
        for queue in self.queues.values() {
            queue.shutdown();
        }
        info!("dispatcher stopped");
    }
}
