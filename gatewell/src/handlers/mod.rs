//! Built-in request handlers.
//!
//! These cover the server's own surface: version and debug endpoints, the
//! async-job API, and the work-monitor snapshot. Application handlers are
//! registered the same way through [`Router`].

mod debug;
mod jobs_api;
mod version;
mod work_monitor;

pub use debug::DebugHandler;
pub use jobs_api::JobApiHandler;
pub use version::VersionHandler;
pub use work_monitor::WorkMonitorHandler;

use crate::handler::Router;
use crate::monitor::MonitorService;
use crate::server::ServerContext;
use std::sync::Arc;

/// Builds the route table for the built-in handlers.
pub fn default_router(context: &Arc<ServerContext>, monitor: &Arc<MonitorService>) -> Router {
    let mut router = Router::new();

    router.add_prefix("/version", VersionHandler::new);
    router.add_prefix("/debug", DebugHandler::new);

    let jobs = Arc::clone(context.jobs());
    router.add_prefix("/job", move |request| {
        JobApiHandler::new(request, Arc::clone(&jobs))
    });

    let monitor = Arc::clone(monitor);
    router.add_prefix("/monitor", move |request| {
        WorkMonitorHandler::new(request, Arc::clone(&monitor))
    });

    router
}
