//! Server error taxonomy.
//!
//! Every failure inside the request path is expressed as a [`ServerError`]
//! and translated into an HTTP response before it reaches the wire. Errors
//! raised while a job executes are captured by the job and turned into the
//! handler's error response; they never escape to an event-loop thread.

use crate::protocol::HttpStatus;
use std::io;
use thiserror::Error;

/// Errors that can occur while accepting, dispatching, and answering requests.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A dispatcher queue is at capacity. Transient; the client should retry.
    #[error("dispatcher queue '{queue}' is full")]
    QueueFull { queue: String },

    /// The server is shutting down and no longer accepts work.
    #[error("server is shutting down")]
    ShuttingDown,

    /// The request could not be parsed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request used an unsupported HTTP method.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// A body-carrying request had no usable content-length.
    #[error("content-length required")]
    LengthRequired,

    /// The request header block exceeded the configured maximum.
    #[error("request header too large ({size} bytes)")]
    HeaderTooLarge { size: usize },

    /// The request body exceeded the configured maximum.
    #[error("request body too large ({size} bytes)")]
    BodyTooLarge { size: usize },

    /// The request URI exceeded the configured maximum.
    #[error("request uri too long")]
    UriTooLong,

    /// Handler-level: the addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Handler-level: the caller may not perform this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Handler-level: the operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request was cancelled before a result was produced.
    #[error("request cancelled")]
    Cancelled,

    /// Unexpected internal failure; the connection closes after the response.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O failure on a socket or file.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl ServerError {
    /// Maps the error onto the HTTP status code used for the response.
    pub fn status(&self) -> HttpStatus {
        match self {
            Self::QueueFull { .. } | Self::ShuttingDown => HttpStatus::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => HttpStatus::BAD_REQUEST,
            Self::MethodNotAllowed => HttpStatus::METHOD_NOT_ALLOWED,
            Self::LengthRequired => HttpStatus::LENGTH_REQUIRED,
            Self::HeaderTooLarge { .. } => HttpStatus::HEADER_FIELDS_TOO_LARGE,
            Self::BodyTooLarge { .. } => HttpStatus::PAYLOAD_TOO_LARGE,
            Self::UriTooLong => HttpStatus::URI_TOO_LONG,
            Self::NotFound(_) => HttpStatus::NOT_FOUND,
            Self::Forbidden(_) => HttpStatus::FORBIDDEN,
            Self::Conflict(_) => HttpStatus::CONFLICT,
            Self::Cancelled => HttpStatus::CLIENT_CLOSED_REQUEST,
            Self::Internal(_) | Self::Io(_) => HttpStatus::SERVER_ERROR,
        }
    }

    /// Returns true for transient conditions that deserve a retry hint.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::QueueFull { .. } | Self::ShuttingDown)
    }

    /// Returns true if the connection must close after the error response.
    ///
    /// Protocol-level failures leave the read stream in an unknown position,
    /// and internal errors may have corrupted per-request state.
    pub fn closes_connection(&self) -> bool {
        matches!(
            self,
            Self::BadRequest(_)
                | Self::MethodNotAllowed
                | Self::LengthRequired
                | Self::HeaderTooLarge { .. }
                | Self::BodyTooLarge { .. }
                | Self::UriTooLong
                | Self::Internal(_)
                | Self::Io(_)
        )
    }
}
