//! HTTP framing collaborator.
//!
//! The core only relies on two events from this layer: "a complete request
//! has been read" and "these bytes must be written". Request heads are
//! parsed with `httparse`; everything else here is plain framing state
//! carried by [`HttpRequest`] and [`HttpResponse`].

mod request;
mod response;
mod status;

pub use request::{parse_request_head, HttpMethod, HttpRequest, RequestHead};
pub use response::{chunk_frame, HttpResponse, LAST_CHUNK};
pub use status::HttpStatus;

/// Maximal size of a request header block (1 MiB).
pub const MAXIMAL_HEADER_SIZE: usize = 1024 * 1024;

/// Maximal size of a request body (512 MiB).
pub const MAXIMAL_BODY_SIZE: usize = 512 * 1024 * 1024;

/// Maximal number of buffered pipeline bytes per connection (1 GiB).
pub const MAXIMAL_PIPELINE_SIZE: usize = 1024 * 1024 * 1024;

/// Maximal length of a request URI.
pub const MAXIMAL_URI_LENGTH: usize = 16384;
