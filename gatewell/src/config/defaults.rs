//! Default configuration values.

/// Keep-alive timeout for idle connections, in seconds.
pub const DEFAULT_KEEP_ALIVE_TIMEOUT_SECS: u64 = 300;

/// Whether handlers may execute directly on event-loop threads.
pub const DEFAULT_DIRECT_EXECUTION_ALLOWED: bool = true;

/// Maximal number of concurrent chunked-streaming tasks.
pub const DEFAULT_MAX_CHUNKED_TASKS: usize = 64;

/// Bounded capacity of a dispatcher queue.
pub const DEFAULT_QUEUE_SIZE: usize = 512;

/// Worker threads per dispatcher queue.
pub const DEFAULT_QUEUE_THREADS: usize = 4;

/// Capacity of the long-running query queue.
pub const DEFAULT_AQL_QUEUE_SIZE: usize = 256;

/// Worker threads of the long-running query queue.
pub const DEFAULT_AQL_QUEUE_THREADS: usize = 2;

/// Time-to-live of stored async job results, in seconds.
pub const DEFAULT_ASYNC_JOB_TTL_SECS: u64 = 3600;

/// Maximal number of stored async job entries.
pub const DEFAULT_ASYNC_JOB_CAPACITY: usize = 4096;

/// Upper bound on automatically sized event-loop fleets.
pub const MAX_DEFAULT_EVENT_LOOPS: usize = 8;

/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Number of event loops when the configuration is silent: one per core,
/// clamped to [1, MAX_DEFAULT_EVENT_LOOPS].
pub fn default_event_loops() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_DEFAULT_EVENT_LOOPS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_event_loops_in_range() {
        let loops = default_event_loops();
        assert!(loops >= 1);
        assert!(loops <= MAX_DEFAULT_EVENT_LOOPS);
    }
}
