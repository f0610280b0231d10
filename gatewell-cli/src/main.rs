//! Gatewell CLI - command-line interface
//!
//! This binary runs the Gatewell server: it loads the INI configuration,
//! sets up tracing, assembles the scheduler / dispatcher / server stack,
//! and handles Ctrl-C shutdown.
//!
//! # Configuration
//!
//! Settings are loaded from `gatewell.ini` (or `--config`) on startup.
//! CLI arguments override config file values when specified.

mod error;
mod runner;

use clap::{Parser, Subcommand};
use error::CliError;
use gatewell::config::{load_config, ConfigFile};
use gatewell::server::Endpoint;
use runner::ServerRunner;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default listening endpoint when neither config nor CLI name one.
const DEFAULT_ENDPOINT: &str = "tcp://127.0.0.1:8529";

#[derive(Debug, Parser)]
#[command(name = "gatewell", version = gatewell::VERSION, about = "Gatewell database HTTP front end")]
struct Cli {
    /// Path to the INI configuration file.
    #[arg(long, default_value = "gatewell.ini", global = true)]
    config: PathBuf,

    /// Log filter, overriding the config file (e.g. `info`, `gatewell=debug`).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the server.
    Serve {
        /// Listening endpoints, e.g. `tcp://0.0.0.0:8529`. Repeatable.
        #[arg(long = "endpoint")]
        endpoints: Vec<String>,
    },
    /// Load the configuration and print the effective settings.
    CheckConfig,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli.config)?;
    init_tracing(&config, cli.log_level.as_deref());

    match cli.command {
        Command::Serve { endpoints } => {
            let endpoints = parse_endpoints(&endpoints)?;
            ServerRunner::new(config, endpoints).run()
        }
        Command::CheckConfig => {
            println!("{:#?}", config);
            Ok(())
        }
    }
}

fn parse_endpoints(specs: &[String]) -> Result<Vec<Endpoint>, CliError> {
    if specs.is_empty() {
        let endpoint = DEFAULT_ENDPOINT
            .parse()
            .map_err(|e| CliError::Endpoint(format!("{}", e)))?;
        return Ok(vec![endpoint]);
    }

    specs
        .iter()
        .map(|spec| {
            spec.parse()
                .map_err(|e| CliError::Endpoint(format!("{}: {}", spec, e)))
        })
        .collect()
}

fn init_tracing(config: &ConfigFile, override_level: Option<&str>) {
    let directive = override_level.unwrap_or(&config.log.level);
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
