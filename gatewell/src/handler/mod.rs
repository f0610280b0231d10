//! Request handler abstraction.
//!
//! A [`Handler`] is the unit of work bound to a single request: it owns the
//! request and the in-progress response, runs `prepare → execute → finalize`
//! on whichever thread its job lands on, and can be cancelled cooperatively
//! from any thread via its [`KillSwitch`].
//!
//! Handlers never run on an event-loop thread unless they declare
//! [`ExecutionMode::Direct`], which is reserved for handlers that perform no
//! blocking work.

mod factory;

pub use factory::{HandlerCtor, HandlerFactory, NotFoundHandler, Router};

use crate::dispatcher::WorkerContext;
use crate::error::ServerError;
use crate::protocol::{HttpRequest, HttpResponse};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Name of the default dispatcher queue.
pub const STANDARD_QUEUE: &str = "standard";

/// Execution policy for a handler.
///
/// `Direct` handlers run inline on the event-loop thread and must not block
/// or suspend; everything else is queued onto a dispatcher worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Execute inline on the event-loop thread.
    Direct,
    /// Execute on a dispatcher worker thread.
    Queued,
}

/// Shared cancellation flag between a handler and whoever may cancel it.
///
/// Handlers consult the switch at their cancellation points; tripping it is
/// safe from any thread and is permanent.
#[derive(Clone, Debug, Default)]
pub struct KillSwitch(Arc<AtomicBool>);

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn kill(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_killed(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A request processor bound to exactly one request.
///
/// # Lifecycle
///
/// 1. The factory creates the handler from a complete [`HttpRequest`].
/// 2. The server wraps it in a job (or runs it inline when direct).
/// 3. On a worker: `prepare_execute` → `execute` → `finalize_execute`.
///    `finalize_execute` runs even when `execute` fails.
/// 4. The finished handler moves back to the comm task (sync path) or its
///    response is published in the async-job registry (detached path).
pub trait Handler: Send + 'static {
    /// Short name used for logging and work descriptions.
    fn name(&self) -> &'static str;

    /// Selects the dispatcher queue for this handler.
    fn queue(&self) -> &str {
        STANDARD_QUEUE
    }

    /// Execution policy. Direct handlers must not perform blocking work.
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Queued
    }

    /// Returns a clone of the handler's cancellation flag.
    fn kill_switch(&self) -> KillSwitch;

    /// Called on the worker before `execute`, with the worker's context.
    ///
    /// Handlers that interact with their queue (such as marking the worker
    /// blocked) keep the context; the default ignores it.
    fn set_worker_context(&mut self, _ctx: WorkerContext) {}

    /// Prepares execution. Runs on the executing thread before `execute`.
    fn prepare_execute(&mut self) {}

    /// Executes the request, filling in the response.
    fn execute(&mut self) -> Result<(), ServerError>;

    /// Finalizes execution. Always runs after `execute`, even on failure.
    fn finalize_execute(&mut self) {}

    /// The request this handler owns.
    fn request(&self) -> &HttpRequest;

    /// Mutable access to the in-progress response.
    fn response_mut(&mut self) -> &mut HttpResponse;

    /// Takes the finished response out of the handler.
    fn take_response(&mut self) -> HttpResponse;

    /// Converts an execution error into the handler's error response.
    fn handle_error(&mut self, err: &ServerError) {
        *self.response_mut() = HttpResponse::from_error(err);
    }
}
