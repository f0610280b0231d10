//! Schedulable wrapper around a handler.

use super::queue::WorkerContext;
use crate::async_jobs::AsyncJobStatus;
use crate::comm::TaskId;
use crate::error::ServerError;
use crate::handler::{Handler, KillSwitch};
use crate::server::ServerContext;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, trace, warn};

/// Completion status of a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// The handler produced its response.
    Done,
    /// The handler failed; the response carries the error document.
    Failed,
    /// The job was cancelled before or during execution.
    Cancelled,
}

/// A unit of dispatchable work wrapping exactly one handler.
///
/// Whether a job is detached is fixed at creation: it is detached iff no
/// task id was supplied at submission, and that never changes afterwards.
pub struct ServerJob {
    handler: Option<Box<dyn Handler>>,
    handler_name: &'static str,
    description: String,
    queue_name: String,
    task: Option<TaskId>,
    async_id: Option<u64>,
    kill: KillSwitch,
}

impl ServerJob {
    /// Wraps a handler for execution on behalf of `task`.
    ///
    /// Passing `None` creates a detached job whose response is published to
    /// the async job registry (when an id is attached) or discarded.
    pub fn new(handler: Box<dyn Handler>, task: Option<TaskId>) -> Self {
        let request = handler.request();
        let description = format!("{} {}", request.method(), request.path());
        Self {
            handler_name: handler.name(),
            description,
            queue_name: handler.queue().to_string(),
            kill: handler.kill_switch(),
            handler: Some(handler),
            task,
            async_id: None,
        }
    }

    /// Attaches the async registry id whose entry receives the result.
    pub fn with_async_id(mut self, id: u64) -> Self {
        self.async_id = Some(id);
        self
    }

    /// Name of the queue this job targets.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Short handler name for logging and work descriptions.
    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }

    /// Human-readable request line for work descriptions.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// True if this job has no owning comm task.
    pub fn is_detached(&self) -> bool {
        self.task.is_none()
    }

    /// Requests cooperative cancellation.
    pub fn cancel(&self) {
        self.kill.kill();
    }

    /// The kill switch shared with the wrapped handler.
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.kill.is_killed()
    }

    /// Called by the worker before execution.
    pub fn attach_worker(&mut self, ctx: WorkerContext) {
        if let Some(handler) = self.handler.as_mut() {
            handler.set_worker_context(ctx);
        }
    }

    /// Executes the handler: prepare → execute → finalize.
    ///
    /// Every failure mode is captured here. `finalize_execute` runs even
    /// when `execute` errors or panics, and errors are folded into the
    /// handler's error response; nothing propagates to the worker loop.
    pub fn work(&mut self) -> JobOutcome {
        let Some(handler) = self.handler.as_mut() else {
            return JobOutcome::Failed;
        };

        if self.kill.is_killed() {
            trace!(handler = self.handler_name, "job cancelled before execution");
            handler.handle_error(&ServerError::Cancelled);
            return JobOutcome::Cancelled;
        }

        trace!(handler = self.handler_name, request = %self.description, "job starting");
        handler.prepare_execute();

        let result = catch_unwind(AssertUnwindSafe(|| handler.execute()));
        handler.finalize_execute();

        match result {
            Ok(Ok(())) => {
                trace!(handler = self.handler_name, "job finished");
                JobOutcome::Done
            }
            Ok(Err(ServerError::Cancelled)) => {
                debug!(handler = self.handler_name, "job cancelled during execution");
                handler.handle_error(&ServerError::Cancelled);
                JobOutcome::Cancelled
            }
            Ok(Err(err)) => {
                debug!(handler = self.handler_name, error = %err, "job failed");
                handler.handle_error(&err);
                JobOutcome::Failed
            }
            Err(_panic) => {
                warn!(handler = self.handler_name, "handler panicked");
                handler.handle_error(&ServerError::Internal(
                    "handler panicked during execution".to_string(),
                ));
                JobOutcome::Failed
            }
        }
    }

    /// Hands the finished handler off to its consumer.
    ///
    /// Detached path: the serialized response goes into the async job
    /// registry (exactly one terminal transition per job). Sync path: the
    /// handler moves back to the comm task via the registry; if the task
    /// vanished the response is dropped without signalling anything.
    pub fn cleanup(mut self, ctx: &ServerContext, outcome: JobOutcome) {
        let Some(mut handler) = self.handler.take() else {
            return;
        };

        if self.is_detached() {
            let status = match outcome {
                JobOutcome::Done => AsyncJobStatus::Done,
                JobOutcome::Failed => AsyncJobStatus::Error,
                JobOutcome::Cancelled => AsyncJobStatus::Cancelled,
            };
            match self.async_id {
                Some(id) => ctx.jobs().finish(id, status, Some(handler.take_response())),
                None => trace!(
                    handler = self.handler_name,
                    "detached job without stored result finished"
                ),
            }
        } else if let Some(task) = self.task {
            if !ctx.registry().send_response(task, handler) {
                trace!(
                    handler = self.handler_name,
                    task = %task,
                    "comm task gone, response discarded"
                );
            }
        }
    }
}
