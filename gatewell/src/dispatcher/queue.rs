//! A bounded job queue with a fixed worker pool.

use super::job::ServerJob;
use crate::error::ServerError;
use crate::monitor::MonitorService;
use crate::server::ServerContext;
use crossbeam_channel::{bounded, Receiver, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, info, trace};

/// Point-in-time counters of one queue.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueStats {
    /// Jobs waiting in the queue.
    pub queued: usize,
    /// Jobs currently executing on workers.
    pub running: usize,
    /// Workers that declared themselves blocked.
    pub blocked: usize,
    /// Jobs processed since startup.
    pub processed: u64,
}

#[derive(Default)]
struct QueueCounters {
    running: AtomicUsize,
    processed: AtomicU64,
}

/// Context a worker hands to the handler it is about to execute.
///
/// Lets long-running handlers mark their worker as blocked, so queue
/// statistics distinguish stuck capacity from busy capacity.
#[derive(Clone)]
pub struct WorkerContext {
    blocked: Arc<AtomicUsize>,
}

impl WorkerContext {
    /// Marks the worker blocked until the guard drops.
    pub fn block(&self) -> BlockedGuard {
        self.blocked.fetch_add(1, Ordering::Relaxed);
        BlockedGuard {
            blocked: Arc::clone(&self.blocked),
        }
    }
}

/// RAII guard for a blocked worker.
pub struct BlockedGuard {
    blocked: Arc<AtomicUsize>,
}

impl Drop for BlockedGuard {
    fn drop(&mut self) {
        self.blocked.fetch_sub(1, Ordering::Relaxed);
    }
}

/// A bounded FIFO of ready jobs with a fixed pool of worker threads.
///
/// Capacity counts queued (not yet running) jobs: with capacity N and M
/// workers, at most N jobs wait and M execute; further submissions fail
/// with [`ServerError::QueueFull`].
pub struct DispatcherQueue {
    name: String,
    capacity: usize,
    sender: Mutex<Option<crossbeam_channel::Sender<ServerJob>>>,
    stopping: AtomicBool,
    counters: Arc<QueueCounters>,
    blocked: Arc<AtomicUsize>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DispatcherQueue {
    /// Creates the queue and starts its worker threads.
    pub fn start(
        name: &str,
        capacity: usize,
        threads: usize,
        ctx: Arc<ServerContext>,
        monitor: Arc<MonitorService>,
    ) -> Arc<Self> {
        let (tx, rx) = bounded::<ServerJob>(capacity);
        let counters = Arc::new(QueueCounters::default());
        let blocked = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let worker_name = format!("{}-worker-{}", name, i);
            let rx = rx.clone();
            let ctx = Arc::clone(&ctx);
            let monitor = Arc::clone(&monitor);
            let counters = Arc::clone(&counters);
            let blocked = Arc::clone(&blocked);

            let handle = std::thread::Builder::new()
                .name(worker_name.clone())
                .spawn(move || worker_loop(worker_name, rx, ctx, monitor, counters, blocked));

            match handle {
                Ok(handle) => workers.push(handle),
                Err(e) => debug!(queue = name, error = %e, "failed to start worker thread"),
            }
        }

        info!(queue = name, capacity, threads, "dispatcher queue started");

        Arc::new(Self {
            name: name.to_string(),
            capacity,
            sender: Mutex::new(Some(tx)),
            stopping: AtomicBool::new(false),
            counters,
            blocked,
            workers: Mutex::new(workers),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a job, failing fast when the queue is at capacity.
    pub fn try_submit(&self, job: ServerJob) -> Result<(), ServerError> {
        if self.stopping.load(Ordering::Relaxed) {
            return Err(ServerError::ShuttingDown);
        }

        let sender = self.sender.lock().map_err(|_| {
            ServerError::Internal(format!("queue '{}' lock poisoned", self.name))
        })?;

        let Some(sender) = sender.as_ref() else {
            return Err(ServerError::ShuttingDown);
        };

        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ServerError::QueueFull {
                queue: self.name.clone(),
            }),
            Err(TrySendError::Disconnected(_)) => Err(ServerError::ShuttingDown),
        }
    }

    /// Current queue counters.
    pub fn stats(&self) -> QueueStats {
        let queued = self
            .sender
            .lock()
            .ok()
            .and_then(|s| s.as_ref().map(|tx| tx.len()))
            .unwrap_or(0);

        QueueStats {
            queued,
            running: self.counters.running.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            processed: self.counters.processed.load(Ordering::Relaxed),
        }
    }

    /// Graceful drain: stop accepting, let workers finish queued jobs,
    /// then join them.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::Relaxed);

        // Dropping the sender closes the channel once workers drain it.
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }

        let workers = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(_) => Vec::new(),
        };
        for handle in workers {
            if handle.join().is_err() {
                debug!(queue = %self.name, "worker panicked during shutdown");
            }
        }

        info!(queue = %self.name, "dispatcher queue stopped");
    }
}

/// Worker loop: pop, execute, clean up, repeat until the channel closes.
fn worker_loop(
    name: String,
    rx: Receiver<ServerJob>,
    ctx: Arc<ServerContext>,
    monitor: Arc<MonitorService>,
    counters: Arc<QueueCounters>,
    blocked: Arc<AtomicUsize>,
) {
    let registration = monitor.register_thread(&name);
    trace!(worker = %name, "worker started");

    while let Ok(mut job) = rx.recv() {
        counters.running.fetch_add(1, Ordering::Relaxed);

        let outcome = {
            let _work = registration.push_handler(job.handler_name(), job.description());
            job.attach_worker(WorkerContext {
                blocked: Arc::clone(&blocked),
            });
            job.work()
        };
        job.cleanup(&ctx, outcome);

        counters.running.fetch_sub(1, Ordering::Relaxed);
        counters.processed.fetch_add(1, Ordering::Relaxed);
    }

    trace!(worker = %name, "worker stopped");
}
