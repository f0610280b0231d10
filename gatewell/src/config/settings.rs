//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file. These are
//! pure data types with no parsing logic.

use super::defaults;
use std::time::Duration;

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// HTTP front-end settings.
    pub http: HttpSettings,
    /// Event-loop fleet settings.
    pub scheduler: SchedulerSettings,
    /// Dispatcher queue map.
    pub dispatcher: DispatcherSettings,
    /// Detached-job registry settings.
    pub async_jobs: AsyncJobSettings,
    /// Logging settings.
    pub log: LogSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            http: HttpSettings::default(),
            scheduler: SchedulerSettings::default(),
            dispatcher: DispatcherSettings::default(),
            async_jobs: AsyncJobSettings::default(),
            log: LogSettings::default(),
        }
    }
}

/// HTTP connection handling.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Idle timeout for keep-alive connections. Zero closes the connection
    /// after the first response.
    pub keep_alive_timeout: Duration,
    /// Whether direct handlers may run inline on event-loop threads.
    pub direct_execution_allowed: bool,
    /// Upper bound on concurrent chunked-streaming tasks.
    pub max_chunked_tasks: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            keep_alive_timeout: Duration::from_secs(defaults::DEFAULT_KEEP_ALIVE_TIMEOUT_SECS),
            direct_execution_allowed: defaults::DEFAULT_DIRECT_EXECUTION_ALLOWED,
            max_chunked_tasks: defaults::DEFAULT_MAX_CHUNKED_TASKS,
        }
    }
}

/// Event-loop fleet sizing.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Number of event loops (reactor threads).
    pub event_loops: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            event_loops: defaults::default_event_loops(),
        }
    }
}

/// One dispatcher queue.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Queue name, referenced by handlers.
    pub name: String,
    /// Bounded capacity of queued jobs.
    pub size: usize,
    /// Worker threads.
    pub threads: usize,
}

/// Dispatcher queue map.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub queues: Vec<QueueSettings>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            queues: vec![
                QueueSettings {
                    name: "standard".to_string(),
                    size: defaults::DEFAULT_QUEUE_SIZE,
                    threads: defaults::DEFAULT_QUEUE_THREADS,
                },
                QueueSettings {
                    name: "aql".to_string(),
                    size: defaults::DEFAULT_AQL_QUEUE_SIZE,
                    threads: defaults::DEFAULT_AQL_QUEUE_THREADS,
                },
            ],
        }
    }
}

/// Detached-job registry bounds.
#[derive(Debug, Clone)]
pub struct AsyncJobSettings {
    /// How long stored results stay fetchable.
    pub ttl: Duration,
    /// Maximal number of stored entries.
    pub capacity: usize,
}

impl Default for AsyncJobSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(defaults::DEFAULT_ASYNC_JOB_TTL_SECS),
            capacity: defaults::DEFAULT_ASYNC_JOB_CAPACITY,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Tracing filter directive, e.g. `info` or `gatewell=debug`.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: defaults::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}
