//! Server glue: listening endpoints, shared context, and the HTTP server.
//!
//! [`HttpServer`] wires the scheduler, the dispatcher, the handler factory
//! and the async job registry together: it accepts connections, decides
//! between direct and queued execution, and owns the shutdown ordering.

mod context;
mod endpoint;
mod http_server;

pub use context::ServerContext;
pub use endpoint::Endpoint;
pub use http_server::{HttpServer, RequestOutcome, ASYNC_EXECUTION_HEADER, ASYNC_ID_HEADER};
