//! Async-job management endpoints.

use crate::async_jobs::{AsyncJobManager, AsyncJobStatus, FetchOutcome};
use crate::error::ServerError;
use crate::handler::{ExecutionMode, Handler, KillSwitch};
use crate::protocol::{HttpMethod, HttpRequest, HttpResponse, HttpStatus};
use crate::server::ASYNC_ID_HEADER;
use std::sync::Arc;

/// `/job/{id}`: poll, fetch, and cancel detached jobs.
///
/// - `GET` peeks at the status without consuming the result.
/// - `PUT` fetches: 200 with the stored response if the job finished, 204
///   while pending, 410 for a cancelled job, 404 when unknown (never
///   existed, expired, or already fetched).
/// - `DELETE` cancels: the executing handler's kill switch is tripped and
///   the entry marked cancelled.
///
/// Registry operations are quick map lookups, so this handler runs direct.
pub struct JobApiHandler {
    request: HttpRequest,
    response: HttpResponse,
    kill: KillSwitch,
    jobs: Arc<AsyncJobManager>,
}

impl JobApiHandler {
    pub fn new(request: HttpRequest, jobs: Arc<AsyncJobManager>) -> Box<dyn Handler> {
        Box::new(Self {
            request,
            response: HttpResponse::default(),
            kill: KillSwitch::new(),
            jobs,
        })
    }

    fn job_id(&self) -> Option<u64> {
        let segments = self.request.path_segments();
        match segments.as_slice() {
            ["job", id] => id.parse().ok(),
            _ => None,
        }
    }

    fn get_job(&mut self, id: u64) -> Result<(), ServerError> {
        match self.jobs.poll(id) {
            Some(status) => {
                self.response = HttpResponse::ok();
                self.response.set_json_body(&serde_json::json!({
                    "id": id,
                    "status": status.as_str(),
                }));
                Ok(())
            }
            None => Err(ServerError::NotFound(format!("job {}", id))),
        }
    }

    fn put_job(&mut self, id: u64) -> Result<(), ServerError> {
        match self.jobs.fetch(id) {
            FetchOutcome::Ready(AsyncJobStatus::Cancelled, _) => {
                self.response = HttpResponse::new(HttpStatus::GONE);
                self.response.set_json_body(&serde_json::json!({
                    "id": id,
                    "status": AsyncJobStatus::Cancelled.as_str(),
                }));
                Ok(())
            }
            FetchOutcome::Ready(_, Some(mut stored)) => {
                stored.set_header(ASYNC_ID_HEADER, &id.to_string());
                self.response = stored;
                Ok(())
            }
            FetchOutcome::Ready(status, None) => {
                // Finished without a stored body; report the status only.
                self.response = HttpResponse::ok();
                self.response.set_json_body(&serde_json::json!({
                    "id": id,
                    "status": status.as_str(),
                }));
                Ok(())
            }
            FetchOutcome::Pending => {
                self.response = HttpResponse::new(HttpStatus::NO_CONTENT);
                Ok(())
            }
            FetchOutcome::Unknown => Err(ServerError::NotFound(format!("job {}", id))),
        }
    }

    fn delete_job(&mut self, id: u64) -> Result<(), ServerError> {
        if self.jobs.cancel(id) {
            self.response = HttpResponse::ok();
            self.response
                .set_json_body(&serde_json::json!({ "result": true }));
            Ok(())
        } else {
            Err(ServerError::NotFound(format!("job {}", id)))
        }
    }
}

impl Handler for JobApiHandler {
    fn name(&self) -> &'static str {
        "JobApiHandler"
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Direct
    }

    fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    fn execute(&mut self) -> Result<(), ServerError> {
        let id = self
            .job_id()
            .ok_or_else(|| ServerError::NotFound(self.request.path().to_string()))?;

        match self.request.method() {
            HttpMethod::Get => self.get_job(id),
            HttpMethod::Put => self.put_job(id),
            HttpMethod::Delete => self.delete_job(id),
            other => Err(ServerError::BadRequest(format!(
                "{} not supported on /job",
                other
            ))),
        }
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
