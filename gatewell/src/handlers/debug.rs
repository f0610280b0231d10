//! Debug helper endpoint.

use crate::dispatcher::WorkerContext;
use crate::error::ServerError;
use crate::handler::{Handler, KillSwitch};
use crate::protocol::{HttpRequest, HttpResponse};
use std::time::Duration;

/// Granularity of the sleep loop; the kill switch is consulted between
/// slices.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// `GET /debug?sleep=S&block=B`: sleeps S seconds on its worker thread.
///
/// With `block=true` the worker is marked blocked for the duration, which
/// shows up in queue statistics. The sleep is sliced so a cancellation is
/// observed within [`SLEEP_SLICE`].
pub struct DebugHandler {
    request: HttpRequest,
    response: HttpResponse,
    kill: KillSwitch,
    worker: Option<WorkerContext>,
}

impl DebugHandler {
    pub fn new(request: HttpRequest) -> Box<dyn Handler> {
        Box::new(Self {
            request,
            response: HttpResponse::default(),
            kill: KillSwitch::new(),
            worker: None,
        })
    }
}

impl Handler for DebugHandler {
    fn name(&self) -> &'static str {
        "DebugHandler"
    }

    fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    fn set_worker_context(&mut self, ctx: WorkerContext) {
        self.worker = Some(ctx);
    }

    fn execute(&mut self) -> Result<(), ServerError> {
        let sleep_secs: f64 = self
            .request
            .param("sleep")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0)
            .max(0.0);
        let block = self
            .request
            .param("block")
            .is_some_and(|v| v == "true" || v == "1");

        let _blocked = match (block, &self.worker) {
            (true, Some(worker)) => Some(worker.block()),
            _ => None,
        };

        let mut remaining = Duration::from_secs_f64(sleep_secs);
        while !remaining.is_zero() {
            if self.kill.is_killed() {
                return Err(ServerError::Cancelled);
            }
            let slice = remaining.min(SLEEP_SLICE);
            std::thread::sleep(slice);
            remaining -= slice;
        }

        self.response = HttpResponse::ok();
        self.response.set_json_body(&serde_json::json!({
            "server": crate::SERVER_NAME,
            "version": crate::VERSION,
            "sleep": sleep_secs,
            "block": block,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{HttpMethod, HttpStatus};
    use std::time::Instant;

    #[test]
    fn test_no_sleep() {
        let mut handler = DebugHandler::new(HttpRequest::synthetic(HttpMethod::Get, "/debug"));
        handler.execute().unwrap();
        let response = handler.take_response();

        assert_eq!(response.status(), HttpStatus::OK);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["server"], "gatewell");
        assert_eq!(body["sleep"], 0.0);
        assert_eq!(body["block"], false);
    }

    #[test]
    fn test_sleep_duration() {
        let mut handler = DebugHandler::new(HttpRequest::synthetic(
            HttpMethod::Get,
            "/debug?sleep=0.05",
        ));
        let start = Instant::now();
        handler.execute().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_cancellation_interrupts_sleep() {
        let mut handler =
            DebugHandler::new(HttpRequest::synthetic(HttpMethod::Get, "/debug?sleep=30"));
        let kill = handler.kill_switch();

        let killer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            kill.kill();
        });

        let start = Instant::now();
        let result = handler.execute();
        killer.join().unwrap();

        assert!(matches!(result, Err(ServerError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_sleep_treated_as_zero() {
        let mut handler = DebugHandler::new(HttpRequest::synthetic(
            HttpMethod::Get,
            "/debug?sleep=abc",
        ));
        handler.execute().unwrap();
        let body: serde_json::Value =
            serde_json::from_slice(handler.take_response().body()).unwrap();
        assert_eq!(body["sleep"], 0.0);
    }
}
