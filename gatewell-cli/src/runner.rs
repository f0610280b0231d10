//! Server assembly and lifecycle.

use crate::error::CliError;
use gatewell::config::ConfigFile;
use gatewell::dispatcher::Dispatcher;
use gatewell::handlers::default_router;
use gatewell::monitor::MonitorService;
use gatewell::scheduler::Scheduler;
use gatewell::server::{Endpoint, HttpServer, ServerContext};
use std::sync::Arc;
use tracing::info;

/// Builds the server from a configuration, runs it until Ctrl-C, then
/// orchestrates shutdown.
pub struct ServerRunner {
    config: ConfigFile,
    endpoints: Vec<Endpoint>,
}

impl ServerRunner {
    pub fn new(config: ConfigFile, endpoints: Vec<Endpoint>) -> Self {
        Self { config, endpoints }
    }

    /// Runs the server. Blocks until shutdown completes.
    pub fn run(self) -> Result<(), CliError> {
        let monitor = MonitorService::start();
        let context = ServerContext::new(&self.config);
        let dispatcher = Dispatcher::start(
            &self.config.dispatcher,
            Arc::clone(&context),
            Arc::clone(&monitor),
        );
        let scheduler = Scheduler::start(self.config.scheduler.event_loops);
        scheduler.open_all();

        let router = default_router(&context, &monitor);
        let server = HttpServer::new(
            context,
            scheduler,
            dispatcher,
            router,
            self.config.http.clone(),
        );

        let bound = server.start_listening(&self.endpoints)?;
        for addr in &bound {
            info!(endpoint = %addr, "gatewell listening");
        }

        wait_for_interrupt().map_err(|e| CliError::Server(e.to_string()))?;

        info!("interrupt received, shutting down");
        server.stop();
        monitor.shutdown();
        Ok(())
    }
}

/// Blocks on Ctrl-C using a throwaway current-thread runtime.
fn wait_for_interrupt() -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(tokio::signal::ctrl_c())
}
