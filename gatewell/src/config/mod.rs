//! Server configuration.
//!
//! Settings are loaded from an INI file (`gatewell.ini`). Missing sections
//! and keys fall back to defaults; malformed values fail fast at startup so
//! a typo never silently reconfigures the server.

mod defaults;
mod parser;
mod settings;

pub use defaults::{
    DEFAULT_ASYNC_JOB_CAPACITY, DEFAULT_ASYNC_JOB_TTL_SECS, DEFAULT_KEEP_ALIVE_TIMEOUT_SECS,
    DEFAULT_MAX_CHUNKED_TASKS, DEFAULT_QUEUE_SIZE, DEFAULT_QUEUE_THREADS,
};
pub use parser::{load_config, ConfigError};
pub use settings::{
    AsyncJobSettings, ConfigFile, DispatcherSettings, HttpSettings, LogSettings, QueueSettings,
    SchedulerSettings,
};
