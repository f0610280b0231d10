//! Gatewell - request-handling core for a database HTTP front end
//!
//! This library provides the scheduler / dispatcher / comm-task coordination
//! subsystem of the Gatewell server: event-loop threads that own connections,
//! a multi-queue dispatcher running request handlers on worker threads, an
//! in-memory registry for detached (fire-and-forget) jobs, and a monitor
//! service that snapshots per-thread work stacks.
//!
//! # High-Level API
//!
//! ```ignore
//! use gatewell::config::ConfigFile;
//! use gatewell::dispatcher::Dispatcher;
//! use gatewell::handlers::default_router;
//! use gatewell::monitor::MonitorService;
//! use gatewell::scheduler::Scheduler;
//! use gatewell::server::{Endpoint, HttpServer, ServerContext};
//!
//! let config = ConfigFile::default();
//! let monitor = MonitorService::start();
//! let context = ServerContext::new(&config);
//! let dispatcher = Dispatcher::start(&config.dispatcher, context.clone(), monitor.clone());
//! let scheduler = Scheduler::start(config.scheduler.event_loops);
//! scheduler.open_all();
//!
//! let router = default_router(&context, &monitor);
//! let server = HttpServer::new(context, scheduler, dispatcher, router, config.http.clone());
//! let bound = server.start_listening(&[Endpoint::tcp("127.0.0.1:8529".parse()?)])?;
//! ```

pub mod async_jobs;
pub mod comm;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod monitor;
pub mod protocol;
pub mod scheduler;
pub mod server;

/// Version of the Gatewell library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name reported in response headers and info payloads.
pub const SERVER_NAME: &str = "gatewell";
