//! Version endpoint.

use crate::error::ServerError;
use crate::handler::{ExecutionMode, Handler, KillSwitch};
use crate::protocol::{HttpRequest, HttpResponse};

/// `GET /version`: reports the server name and version.
///
/// Runs direct on the event-loop thread; there is nothing to block on.
pub struct VersionHandler {
    request: HttpRequest,
    response: HttpResponse,
    kill: KillSwitch,
}

impl VersionHandler {
    pub fn new(request: HttpRequest) -> Box<dyn Handler> {
        Box::new(Self {
            request,
            response: HttpResponse::default(),
            kill: KillSwitch::new(),
        })
    }
}

impl Handler for VersionHandler {
    fn name(&self) -> &'static str {
        "VersionHandler"
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Direct
    }

    fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    fn execute(&mut self) -> Result<(), ServerError> {
        self.response = HttpResponse::ok();
        self.response.set_json_body(&serde_json::json!({
            "server": crate::SERVER_NAME,
            "version": crate::VERSION,
        }));
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
