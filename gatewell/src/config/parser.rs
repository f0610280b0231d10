//! INI file parsing into [`ConfigFile`].

use super::defaults;
use super::settings::{ConfigFile, QueueSettings};
use ini::Ini;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Read(#[from] ini::Error),

    #[error("invalid value for {section}.{key}: '{value}'")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

/// Loads the configuration from an INI file.
///
/// A missing file yields the defaults; malformed values are an error so
/// startup fails fast instead of running with a half-applied config.
pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let ini = Ini::load_from_file(path)?;
    let mut config = ConfigFile::default();
    let mut queues: Vec<QueueSettings> = Vec::new();

    for (section, properties) in ini.iter() {
        let Some(section) = section else {
            // Top-level keys outside any section.
            for (key, _) in properties.iter() {
                warn!(key, "ignoring config key outside of a section");
            }
            continue;
        };

        match section {
            "http" => {
                for (key, value) in properties.iter() {
                    match key {
                        "keep_alive_timeout" => {
                            config.http.keep_alive_timeout =
                                Duration::from_secs(parse(section, key, value)?);
                        }
                        "direct_execution_allowed" => {
                            config.http.direct_execution_allowed = parse(section, key, value)?;
                        }
                        "max_chunked_tasks" => {
                            config.http.max_chunked_tasks = parse(section, key, value)?;
                        }
                        _ => warn!(section, key, "ignoring unknown config key"),
                    }
                }
            }
            "scheduler" => {
                for (key, value) in properties.iter() {
                    match key {
                        "event_loops" => {
                            let loops: usize = parse(section, key, value)?;
                            config.scheduler.event_loops = loops.max(1);
                        }
                        _ => warn!(section, key, "ignoring unknown config key"),
                    }
                }
            }
            "async_jobs" => {
                for (key, value) in properties.iter() {
                    match key {
                        "ttl" => {
                            config.async_jobs.ttl =
                                Duration::from_secs(parse(section, key, value)?);
                        }
                        "capacity" => {
                            config.async_jobs.capacity = parse(section, key, value)?;
                        }
                        _ => warn!(section, key, "ignoring unknown config key"),
                    }
                }
            }
            "log" => {
                for (key, value) in properties.iter() {
                    match key {
                        "level" => config.log.level = value.to_string(),
                        _ => warn!(section, key, "ignoring unknown config key"),
                    }
                }
            }
            _ => {
                if let Some(queue_name) = section.strip_prefix("queue:") {
                    let mut queue = QueueSettings {
                        name: queue_name.to_string(),
                        size: defaults::DEFAULT_QUEUE_SIZE,
                        threads: defaults::DEFAULT_QUEUE_THREADS,
                    };
                    for (key, value) in properties.iter() {
                        match key {
                            "size" => queue.size = parse(section, key, value)?,
                            "threads" => {
                                let threads: usize = parse(section, key, value)?;
                                queue.threads = threads.max(1);
                            }
                            _ => warn!(section, key, "ignoring unknown config key"),
                        }
                    }
                    queues.push(queue);
                } else {
                    warn!(section, "ignoring unknown config section");
                }
            }
        }
    }

    // Explicit queue sections replace the default queue map entirely.
    if !queues.is_empty() {
        config.dispatcher.queues = queues;
    }

    Ok(config)
}

fn parse<T: std::str::FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "gatewell-config-test-{}-{:?}.ini",
            std::process::id(),
            std::thread::current().id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config(Path::new("/nonexistent/gatewell.ini")).unwrap();
        assert_eq!(config.http.keep_alive_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_parse_full_config() {
        let path = write_config(
            "[http]\n\
             keep_alive_timeout = 10\n\
             direct_execution_allowed = false\n\
             max_chunked_tasks = 7\n\
             \n\
             [scheduler]\n\
             event_loops = 2\n\
             \n\
             [queue:standard]\n\
             size = 16\n\
             threads = 2\n\
             \n\
             [queue:slow]\n\
             size = 1\n\
             threads = 1\n\
             \n\
             [async_jobs]\n\
             ttl = 60\n\
             capacity = 32\n",
        );

        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.http.keep_alive_timeout, Duration::from_secs(10));
        assert!(!config.http.direct_execution_allowed);
        assert_eq!(config.http.max_chunked_tasks, 7);
        assert_eq!(config.scheduler.event_loops, 2);
        assert_eq!(config.async_jobs.ttl, Duration::from_secs(60));
        assert_eq!(config.async_jobs.capacity, 32);

        assert_eq!(config.dispatcher.queues.len(), 2);
        let slow = config
            .dispatcher
            .queues
            .iter()
            .find(|q| q.name == "slow")
            .unwrap();
        assert_eq!(slow.size, 1);
        assert_eq!(slow.threads, 1);
    }

    #[test]
    fn test_invalid_value_fails() {
        let path = write_config("[http]\nkeep_alive_timeout = soon\n");
        let result = load_config(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let path = write_config("[http]\nshiny = yes\n[wat]\nx = 1\n");
        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.http.keep_alive_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_queue_sections_replace_defaults() {
        let path = write_config("[queue:only]\nsize = 3\nthreads = 1\n");
        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.dispatcher.queues.len(), 1);
        assert_eq!(config.dispatcher.queues[0].name, "only");
    }
}
