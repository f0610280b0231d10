//! Work-monitor snapshot endpoint.

use crate::error::ServerError;
use crate::handler::{ExecutionMode, Handler, KillSwitch};
use crate::monitor::MonitorService;
use crate::protocol::{HttpRequest, HttpResponse};
use std::sync::Arc;

/// `GET /monitor`: snapshot of all per-thread work stacks.
pub struct WorkMonitorHandler {
    request: HttpRequest,
    response: HttpResponse,
    kill: KillSwitch,
    monitor: Arc<MonitorService>,
}

impl WorkMonitorHandler {
    pub fn new(request: HttpRequest, monitor: Arc<MonitorService>) -> Box<dyn Handler> {
        Box::new(Self {
            request,
            response: HttpResponse::default(),
            kill: KillSwitch::new(),
            monitor,
        })
    }
}

impl Handler for WorkMonitorHandler {
    fn name(&self) -> &'static str {
        "WorkMonitorHandler"
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Direct
    }

    fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    fn execute(&mut self) -> Result<(), ServerError> {
        let snapshot = self.monitor.snapshot();
        self.response = HttpResponse::ok();
        self.response.set_json_body(&snapshot);
        Ok(())
    }

    fn request(&self) -> &HttpRequest {
        &self.request
    }

    fn response_mut(&mut self) -> &mut HttpResponse {
        &mut self.response
    }

    fn take_response(&mut self) -> HttpResponse {
        std::mem::take(&mut self.response)
    }
}
