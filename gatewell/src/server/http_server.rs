//! The HTTP server: glue between scheduler, dispatcher, and handlers.

use super::context::ServerContext;
use super::endpoint::Endpoint;
use crate::comm::TaskId;
use crate::config::HttpSettings;
use crate::dispatcher::{Dispatcher, ServerJob};
use crate::error::ServerError;
use crate::handler::{ExecutionMode, Handler, HandlerFactory};
use crate::protocol::HttpResponse;
use crate::scheduler::{ConnectionSetup, ListenSetup, LoopCommand, Scheduler};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Request header selecting detached execution (`true` or `store`).
pub const ASYNC_EXECUTION_HEADER: &str = "x-gatewell-async";

/// Response header carrying the id of a stored detached job.
pub const ASYNC_ID_HEADER: &str = "x-gatewell-async-id";

/// How a request left [`HttpServer::handle_request`].
pub enum RequestOutcome {
    /// A response is ready now (direct execution or submission failure).
    Responded(HttpResponse),
    /// The job was queued; the comm task will be signalled later.
    Dispatched,
}

/// The server: owns the scheduler fleet, the dispatcher, the handler
/// factory, and the shared context.
pub struct HttpServer {
    context: Arc<ServerContext>,
    scheduler: Arc<Scheduler>,
    dispatcher: Arc<Dispatcher>,
    factory: Arc<dyn HandlerFactory>,
    settings: HttpSettings,
}

impl HttpServer {
    pub fn new(
        context: Arc<ServerContext>,
        scheduler: Arc<Scheduler>,
        dispatcher: Arc<Dispatcher>,
        factory: impl HandlerFactory,
        settings: HttpSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            context,
            scheduler,
            dispatcher,
            factory: Arc::new(factory),
            settings,
        })
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn factory(&self) -> &Arc<dyn HandlerFactory> {
        &self.factory
    }

    pub fn http_settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// Binds the endpoints and mounts their accept loops.
    ///
    /// Returns the bound addresses (useful with port 0). Encrypted
    /// endpoints are rejected: TLS is an external collaborator.
    pub fn start_listening(
        self: &Arc<Self>,
        endpoints: &[Endpoint],
    ) -> Result<Vec<SocketAddr>, ServerError> {
        let mut bound = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            if endpoint.encrypted {
                return Err(ServerError::Internal(format!(
                    "endpoint {} requires TLS, which this build does not terminate",
                    endpoint
                )));
            }

            let listener = std::net::TcpListener::bind(endpoint.address)?;
            let local_addr = listener.local_addr()?;

            let setup = ListenSetup {
                listener,
                server: Arc::clone(self),
            };
            if self
                .scheduler
                .register(LoopCommand::Listen(setup))
                .is_err()
            {
                return Err(ServerError::ShuttingDown);
            }

            info!(endpoint = %local_addr, "listening");
            bound.push(local_addr);
        }

        Ok(bound)
    }

    /// Hands an accepted connection to the event loop that will own it.
    pub fn handle_connected(self: &Arc<Self>, stream: std::net::TcpStream, peer: SocketAddr) {
        let setup = ConnectionSetup {
            stream,
            peer,
            server: Arc::clone(self),
        };
        if self
            .scheduler
            .register(LoopCommand::Connect(setup))
            .is_err()
        {
            // Shutting down: dropping the setup closes the socket.
            debug!(%peer, "connection refused during shutdown");
        }
    }

    /// Executes the handler directly or submits it to the dispatcher.
    ///
    /// Direct execution is a policy declared by the handler and gated by
    /// configuration; direct handlers must not block, because this runs on
    /// the event-loop thread.
    pub fn handle_request(&self, task: TaskId, handler: Box<dyn Handler>) -> RequestOutcome {
        let direct = handler.execution_mode() == ExecutionMode::Direct
            && self.settings.direct_execution_allowed;

        if direct {
            return RequestOutcome::Responded(execute_direct(handler));
        }

        let job = ServerJob::new(handler, Some(task));
        match self.dispatcher.submit(job) {
            Ok(()) => RequestOutcome::Dispatched,
            Err(e) => {
                debug!(task = %task, error = %e, "job submission failed");
                RequestOutcome::Responded(HttpResponse::from_error(&e))
            }
        }
    }

    /// Creates a detached job and returns its id immediately.
    ///
    /// With `store`, the result is kept in the async registry under the
    /// returned id; otherwise the job runs fire-and-forget and the id is
    /// `None`.
    pub fn handle_request_async(
        &self,
        handler: Box<dyn Handler>,
        store: bool,
    ) -> Result<Option<u64>, ServerError> {
        let mut job = ServerJob::new(handler, None);
        let job_id = if store {
            let id = self.context.jobs().register(job.kill_switch());
            job = job.with_async_id(id);
            Some(id)
        } else {
            None
        };

        match self.dispatcher.submit(job) {
            Ok(()) => {
                trace!(job_id = ?job_id, "detached job submitted");
                Ok(job_id)
            }
            Err(e) => {
                // The registry entry must not stay pending forever.
                if let Some(id) = job_id {
                    self.context.jobs().cancel(id);
                }
                Err(e)
            }
        }
    }

    /// Subscribes a task as a chunked producer, bounded by configuration.
    pub fn register_chunked_task(&self, task: TaskId) -> Result<(), ServerError> {
        self.context.register_chunked_task(task)
    }

    /// Drops a task's chunked subscription.
    pub fn unregister_chunked_task(&self, task: TaskId) {
        self.context.unregister_chunked_task(task)
    }

    /// Sends one chunk to a streaming task, from any thread. An empty
    /// payload terminates the stream.
    pub fn send_chunk(&self, task: TaskId, data: bytes::Bytes) -> Result<(), ServerError> {
        self.context.send_chunk(task, data)
    }

    /// A connection closed in an orderly fashion.
    ///
    /// Any job still executing for the task finds the registry entry gone
    /// at handoff time and discards its response.
    pub fn handle_communication_closed(&self, task: TaskId) {
        self.context.registry().remove(task);
        trace!(task = %task, "communication closed");
    }

    /// A connection failed; same cleanup as a close, logged louder.
    pub fn handle_communication_failure(&self, task: TaskId, err: &ServerError) {
        self.context.registry().remove(task);
        warn!(task = %task, error = %err, "communication failure");
    }

    /// Orchestrates a full shutdown.
    ///
    /// Ordering: close live connections, stop the event loops (listeners
    /// die with them), drain the dispatcher, then discard async job state.
    pub fn stop(&self) {
        info!("server stopping");

        self.context.registry().close_all();
        self.scheduler.begin_shutdown();
        self.scheduler.join();
        self.dispatcher.shutdown();
        self.context.shutdown();

        info!("server stopped");
    }
}

/// Runs a direct handler inline, never letting an error escape.
fn execute_direct(mut handler: Box<dyn Handler>) -> HttpResponse {
    handler.prepare_execute();
    let result = handler.execute();
    handler.finalize_execute();

    if let Err(e) = result {
        handler.handle_error(&e);
    }
    handler.take_response()
}
