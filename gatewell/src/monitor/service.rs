//! Monitor service: thread registry, reclamation, snapshots.

use super::description::{WorkDescription, WorkKind};
use crossbeam_queue::SegQueue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Shortest sleep of the reclamation loop.
const MIN_SLEEP: Duration = Duration::from_micros(100);

/// Longest sleep of the reclamation loop.
const MAX_SLEEP: Duration = Duration::from_millis(100);

/// Interval between periodic snapshot traces.
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(10);

/// Upper bound on the reusable description pool.
const POOL_LIMIT: usize = 128;

/// Per-thread work stack shared between the owning thread and snapshots.
struct ThreadSlot {
    name: String,
    stack: Mutex<Vec<WorkDescription>>,
}

struct MonitorInner {
    /// Registered threads by registration key.
    threads: Mutex<HashMap<u64, Arc<ThreadSlot>>>,
    next_key: AtomicU64,
    /// Reusable descriptions; popped before allocating new ones.
    pool: SegQueue<WorkDescription>,
    /// Retired descriptions awaiting reclamation. Pushing never blocks.
    freeable: SegQueue<WorkDescription>,
    stopping: AtomicBool,
}

impl MonitorInner {
    fn take_description(&self, kind: WorkKind, name: &str, detail: &str) -> WorkDescription {
        match self.pool.pop() {
            Some(mut desc) => {
                desc.reset(kind, name, detail);
                desc
            }
            None => WorkDescription::new(kind, name, detail),
        }
    }

    fn retire(&self, desc: WorkDescription) {
        self.freeable.push(desc);
    }
}

/// Process-wide work monitor.
///
/// Created once at server startup; [`MonitorService::shutdown`] stops the
/// reclamation thread and must run before the service is dropped at
/// teardown. Monitor failures are logged and never propagate.
pub struct MonitorService {
    inner: Arc<MonitorInner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorService {
    /// Creates the service and starts the reclamation thread.
    pub fn start() -> Arc<Self> {
        let inner = Arc::new(MonitorInner {
            threads: Mutex::new(HashMap::new()),
            next_key: AtomicU64::new(0),
            pool: SegQueue::new(),
            freeable: SegQueue::new(),
            stopping: AtomicBool::new(false),
        });

        let loop_inner = Arc::clone(&inner);
        let thread = std::thread::Builder::new()
            .name("work-monitor".to_string())
            .spawn(move || reclamation_loop(loop_inner))
            .map_err(|e| warn!(error = %e, "failed to start monitor thread"))
            .ok();

        Arc::new(Self {
            inner,
            thread: Mutex::new(thread),
        })
    }

    /// Registers the calling thread; the returned guard leaves on drop.
    pub fn register_thread(&self, name: &str) -> ThreadRegistration {
        let slot = Arc::new(ThreadSlot {
            name: name.to_string(),
            stack: Mutex::new(vec![self
                .inner
                .take_description(WorkKind::Thread, name, "")]),
        });

        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut threads) = self.inner.threads.lock() {
            threads.insert(key, Arc::clone(&slot));
        }
        trace!(thread = name, "thread registered with work monitor");

        ThreadRegistration {
            inner: Arc::clone(&self.inner),
            slot,
            key,
        }
    }

    /// Snapshots all thread stacks into a structured document.
    pub fn snapshot(&self) -> serde_json::Value {
        let threads = match self.inner.threads.lock() {
            Ok(threads) => threads,
            Err(_) => return serde_json::json!({ "threads": [] }),
        };

        let mut entries = Vec::with_capacity(threads.len());
        for slot in threads.values() {
            let work: Vec<serde_json::Value> = match slot.stack.lock() {
                Ok(stack) => stack
                    .iter()
                    .rev()
                    .map(|desc| {
                        serde_json::json!({
                            "kind": match desc.kind() {
                                WorkKind::Thread => "thread",
                                WorkKind::Handler => "handler",
                            },
                            "name": desc.name(),
                            "detail": desc.detail(),
                            "runtime": desc.elapsed_secs(),
                        })
                    })
                    .collect(),
                Err(_) => Vec::new(),
            };

            entries.push(serde_json::json!({
                "thread": slot.name,
                "work": work,
            }));
        }

        serde_json::json!({
            "time": chrono::Utc::now().to_rfc3339(),
            "threads": entries,
        })
    }

    /// Stops the reclamation thread and joins it.
    pub fn shutdown(&self) {
        self.inner.stopping.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.lock().ok().and_then(|mut t| t.take()) {
            if handle.join().is_err() {
                warn!("monitor thread panicked during shutdown");
            }
        }
    }
}

/// RAII registration of a thread with the monitor.
///
/// Dropping the registration removes the thread from the registry and
/// retires its descriptions through the reclamation queue.
pub struct ThreadRegistration {
    inner: Arc<MonitorInner>,
    slot: Arc<ThreadSlot>,
    key: u64,
}

impl ThreadRegistration {
    /// Pushes a handler description onto this thread's stack.
    ///
    /// Pushes and pops are strictly LIFO on the owning thread, which the
    /// guard's lifetime enforces.
    pub fn push_handler(&self, name: &str, detail: &str) -> HandlerWorkGuard<'_> {
        let desc = self.inner.take_description(WorkKind::Handler, name, detail);
        if let Ok(mut stack) = self.slot.stack.lock() {
            stack.push(desc);
        }
        HandlerWorkGuard { registration: self }
    }

    /// Number of descriptions currently on this thread's stack.
    pub fn depth(&self) -> usize {
        self.slot.stack.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl Drop for ThreadRegistration {
    fn drop(&mut self) {
        if let Ok(mut threads) = self.inner.threads.lock() {
            threads.remove(&self.key);
        }
        if let Ok(mut stack) = self.slot.stack.lock() {
            while let Some(desc) = stack.pop() {
                self.inner.retire(desc);
            }
        }
        trace!(thread = %self.slot.name, "thread left work monitor");
    }
}

/// RAII guard for one unit of handler work.
pub struct HandlerWorkGuard<'a> {
    registration: &'a ThreadRegistration,
}

impl Drop for HandlerWorkGuard<'_> {
    fn drop(&mut self) {
        let popped = self
            .registration
            .slot
            .stack
            .lock()
            .ok()
            .and_then(|mut stack| stack.pop());

        match popped {
            Some(desc) => self.registration.inner.retire(desc),
            None => warn!("work stack underflow"),
        }
    }
}

/// Reclamation loop: drains retired descriptions back into the pool.
///
/// Sleeps adaptively: short while descriptions keep arriving, backing off
/// to [`MAX_SLEEP`] when idle.
fn reclamation_loop(inner: Arc<MonitorInner>) {
    let mut sleep = MIN_SLEEP;
    let mut last_report = std::time::Instant::now();

    while !inner.stopping.load(Ordering::Relaxed) {
        let mut found = false;

        while let Some(desc) = inner.freeable.pop() {
            found = true;
            if inner.pool.len() < POOL_LIMIT {
                inner.pool.push(desc);
            }
        }

        sleep = if found {
            MIN_SLEEP
        } else {
            (sleep * 2).min(MAX_SLEEP)
        };

        if last_report.elapsed() > SNAPSHOT_INTERVAL {
            last_report = std::time::Instant::now();
            if let Ok(threads) = inner.threads.lock() {
                debug!(threads = threads.len(), pool = inner.pool.len(), "work monitor alive");
            }
        }

        std::thread::sleep(sleep);
    }

    // Final drain so nothing lingers in the queue after shutdown.
    while inner.freeable.pop().is_some() {}
}
