//! Registry for detached (fire-and-forget) jobs.
//!
//! A request carrying the async execution header is answered immediately
//! with a job id while its handler runs on a dispatcher worker with no
//! owning connection. The worker publishes the finished response here;
//! clients poll, fetch, or cancel through the job API.
//!
//! Entries live in memory only, bounded by a capacity and a TTL enforced
//! by a background sweeper thread.

use crate::handler::KillSwitch;
use crate::protocol::HttpResponse;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Sleep granularity of the sweeper thread.
const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// Lifecycle state of an async job.
///
/// Every job transitions `Pending → (Done | Error | Cancelled)` exactly
/// once; later transition attempts are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AsyncJobStatus {
    Pending,
    Done,
    Error,
    Cancelled,
}

impl AsyncJobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One registered async job.
struct AsyncJobEntry {
    status: AsyncJobStatus,
    result: Option<HttpResponse>,
    created_at: Instant,
    kill: KillSwitch,
}

/// Outcome of a [`AsyncJobManager::fetch`] call.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The job finished; the stored response is returned and the entry
    /// removed. A second fetch for the same id yields `Unknown`.
    Ready(AsyncJobStatus, Option<HttpResponse>),
    /// The job has not finished yet; the entry stays registered.
    Pending,
    /// No such job (never existed, expired, or already fetched).
    Unknown,
}

/// Registry of detached jobs by id.
pub struct AsyncJobManager {
    entries: DashMap<u64, AsyncJobEntry>,
    next_id: AtomicU64,
    ttl: Duration,
    capacity: usize,
    stopping: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncJobManager {
    /// Creates the manager and starts the expiry sweeper.
    pub fn start(ttl: Duration, capacity: usize) -> Arc<Self> {
        let manager = Arc::new(Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
            ttl,
            capacity,
            stopping: CancellationToken::new(),
            sweeper: Mutex::new(None),
        });

        let sweeper_manager = Arc::clone(&manager);
        let handle = std::thread::Builder::new()
            .name("async-job-sweeper".to_string())
            .spawn(move || sweeper_manager.sweeper_loop())
            .map_err(|e| warn!(error = %e, "failed to start async job sweeper"))
            .ok();

        if let Ok(mut sweeper) = manager.sweeper.lock() {
            *sweeper = handle;
        }
        manager
    }

    /// Registers a new pending job and returns its id.
    ///
    /// Ids are unique for the process lifetime. When the registry is at
    /// capacity the oldest not-yet-fetched entry is evicted with a warning.
    pub fn register(&self, kill: KillSwitch) -> u64 {
        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            id,
            AsyncJobEntry {
                status: AsyncJobStatus::Pending,
                result: None,
                created_at: Instant::now(),
                kill,
            },
        );
        trace!(job_id = id, "async job registered");
        id
    }

    /// Publishes the result of a finished job.
    ///
    /// Only pending entries transition; a job already cancelled (or an id
    /// that expired) keeps its state and the result is dropped.
    pub fn finish(&self, id: u64, status: AsyncJobStatus, result: Option<HttpResponse>) {
        debug_assert!(status.is_terminal());

        match self.entries.get_mut(&id) {
            Some(mut entry) if entry.status == AsyncJobStatus::Pending => {
                entry.status = status;
                entry.result = result;
                trace!(job_id = id, status = status.as_str(), "async job finished");
            }
            Some(entry) => {
                trace!(
                    job_id = id,
                    status = entry.status.as_str(),
                    "async job already terminal, result dropped"
                );
            }
            None => {
                trace!(job_id = id, "async job vanished before completion");
            }
        }
    }

    /// Peeks at a job's status without removing it.
    pub fn poll(&self, id: u64) -> Option<AsyncJobStatus> {
        self.entries.get(&id).map(|entry| entry.status)
    }

    /// Atomically takes the result of a finished job.
    pub fn fetch(&self, id: u64) -> FetchOutcome {
        // remove_if keeps the test-and-remove atomic under concurrent fetches.
        match self.entries.remove_if(&id, |_, entry| entry.status.is_terminal()) {
            Some((_, entry)) => FetchOutcome::Ready(entry.status, entry.result),
            None => {
                if self.entries.contains_key(&id) {
                    FetchOutcome::Pending
                } else {
                    FetchOutcome::Unknown
                }
            }
        }
    }

    /// Cancels a job: marks it cancelled and trips the handler's kill switch.
    ///
    /// Returns false for unknown ids. Cancelling an already finished job is
    /// a no-op beyond the kill signal.
    pub fn cancel(&self, id: u64) -> bool {
        match self.entries.get_mut(&id) {
            Some(mut entry) => {
                entry.kill.kill();
                if entry.status == AsyncJobStatus::Pending {
                    entry.status = AsyncJobStatus::Cancelled;
                }
                debug!(job_id = id, "async job cancelled");
                true
            }
            None => false,
        }
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stops the sweeper and discards all entries.
    pub fn shutdown(&self) {
        self.stopping.cancel();
        if let Some(handle) = self.sweeper.lock().ok().and_then(|mut s| s.take()) {
            let _ = handle.join();
        }

        let pending = self
            .entries
            .iter()
            .filter(|e| e.status == AsyncJobStatus::Pending)
            .count();
        if pending > 0 {
            debug!(pending, "discarding pending async jobs at shutdown");
        }
        self.entries.clear();
    }

    /// Evicts the oldest not-yet-fetched entry to make room.
    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.created_at)
            .map(|entry| *entry.key());

        if let Some(id) = oldest {
            self.entries.remove(&id);
            warn!(job_id = id, capacity = self.capacity, "async job registry full, evicting oldest entry");
        }
    }

    fn sweeper_loop(&self) {
        while !self.stopping.is_cancelled() {
            self.sweep_expired();
            std::thread::sleep(SWEEP_INTERVAL);
        }
    }

    /// Drops entries older than the TTL.
    fn sweep_expired(&self) {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.created_at.elapsed() <= ttl);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            debug!(dropped, "expired async jobs swept");
        }
    }
}
