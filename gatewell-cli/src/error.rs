//! CLI error handling.

use std::fmt;

/// Errors surfaced to the CLI user with friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file problems.
    Config(String),
    /// Endpoint parsing or binding problems.
    Endpoint(String),
    /// Server startup or runtime problems.
    Server(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Endpoint(msg) => write!(f, "Endpoint error: {}", msg),
            Self::Server(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<gatewell::config::ConfigError> for CliError {
    fn from(e: gatewell::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<gatewell::error::ServerError> for CliError {
    fn from(e: gatewell::error::ServerError) -> Self {
        Self::Server(e.to_string())
    }
}
