//! Handler factory and route table.
//!
//! The comm task asks the factory for a handler once it has read a complete
//! request; the factory is the only place that knows which handler serves
//! which path.

use super::{ExecutionMode, Handler, KillSwitch};
use crate::error::ServerError;
use crate::protocol::{HttpRequest, HttpResponse};
use tracing::trace;

/// Constructor for a handler, registered per route prefix.
pub type HandlerCtor = Box<dyn Fn(HttpRequest) -> Box<dyn Handler> + Send + Sync>;

/// Creates a handler for a complete request.
pub trait HandlerFactory: Send + Sync + 'static {
    fn create_handler(&self, request: HttpRequest) -> Box<dyn Handler>;
}

/// Path-prefix route table.
///
/// Routes are matched by the longest registered prefix on segment
/// boundaries; unmatched requests get a [`NotFoundHandler`].
#[derive(Default)]
pub struct Router {
    routes: Vec<(String, HandlerCtor)>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler constructor for a path prefix.
    pub fn add_prefix<F>(&mut self, prefix: &str, ctor: F)
    where
        F: Fn(HttpRequest) -> Box<dyn Handler> + Send + Sync + 'static,
    {
        self.routes
            .push((prefix.trim_end_matches('/').to_string(), Box::new(ctor)));
    }

    fn matches(prefix: &str, path: &str) -> bool {
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

impl HandlerFactory for Router {
    fn create_handler(&self, request: HttpRequest) -> Box<dyn Handler> {
        let best = self
            .routes
            .iter()
            .filter(|(prefix, _)| Self::matches(prefix, request.path()))
            .max_by_key(|(prefix, _)| prefix.len());

        match best {
            Some((prefix, ctor)) => {
                trace!(path = request.path(), prefix = %prefix, "route matched");
                ctor(request)
            }
            None => {
                trace!(path = request.path(), "no route matched");
                Box::new(NotFoundHandler::new(request))
            }
        }
    }
}

/// Fallback handler answering 404 for unrouted paths.
///
/// Runs direct: there is no work to queue for.
pub struct NotFoundHandler {
    request: HttpRequest,
    response: HttpResponse,
    kill: KillSwitch,
}

impl NotFoundHandler {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            response: HttpResponse::default(),
            kill: KillSwitch::new(),
        }
    }
}

impl Handler for NotFoundHandler {
    fn name(&self) -> &'static str {
        "NotFoundHandler"
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Direct
    }

    fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    fn execute(&mut self) -> Result<(), ServerError> {
        self.response =
            HttpResponse::from_error(&ServerError::NotFound(self.request.path().to_string()));
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
