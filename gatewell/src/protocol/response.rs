//! HTTP response representation and wire rendering.

use super::HttpStatus;
use crate::error::ServerError;
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

/// Terminating frame of a chunked response.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// Retry hint (seconds) sent with transient 503 responses.
const RETRY_AFTER_SECS: u32 = 2;

/// An in-progress HTTP response owned by a handler.
///
/// The response is plain data until [`HttpResponse::render`] turns it into
/// wire bytes on the comm task's thread.
#[derive(Debug)]
pub struct HttpResponse {
    status: HttpStatus,
    headers: Vec<(String, String)>,
    content_type: Option<String>,
    body: Vec<u8>,
    chunked: bool,
}

impl HttpResponse {
    /// Creates an empty response with the given status.
    pub fn new(status: HttpStatus) -> Self {
        Self {
            status,
            headers: Vec::new(),
            content_type: None,
            body: Vec::new(),
            chunked: false,
        }
    }

    /// Creates an empty 200 response.
    pub fn ok() -> Self {
        Self::new(HttpStatus::OK)
    }

    /// Builds the standard error response for a [`ServerError`].
    ///
    /// The body carries the same JSON error document for every taxonomy
    /// entry; transient errors additionally get a retry hint header.
    pub fn from_error(err: &ServerError) -> Self {
        let status = err.status();
        let mut response = Self::new(status);

        if err.is_transient() {
            response.set_header("retry-after", &RETRY_AFTER_SECS.to_string());
        }

        response.set_json_body(&serde_json::json!({
            "error": true,
            "errorMessage": err.to_string(),
            "code": status.code(),
        }));
        response
    }

    pub fn status(&self) -> HttpStatus {
        self.status
    }

    pub fn set_status(&mut self, status: HttpStatus) {
        self.status = status;
    }

    /// Adds or replaces a response header (name is lowercased).
    pub fn set_header(&mut self, name: &str, value: &str) {
        let name = name.to_lowercase();
        if let Some(existing) = self.headers.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = value.to_string();
        } else {
            self.headers.push((name, value.to_string()));
        }
    }

    /// Looks up a previously set header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        self.content_type = Some(content_type.to_string());
    }

    /// Replaces the body bytes.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    /// Serializes `value` as the JSON body and sets the content type.
    pub fn set_json_body<T: Serialize>(&mut self, value: &T) {
        // Serialization of handler-built documents cannot fail; fall back to
        // an empty object rather than poisoning the response path.
        self.body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        self.content_type = Some("application/json; charset=utf-8".to_string());
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Marks this response as a chunked stream.
    ///
    /// The head is rendered with `transfer-encoding: chunked`; any body set
    /// on the response becomes the first chunk, and the comm task keeps the
    /// connection in its streaming state until the terminating frame.
    pub fn set_chunked(&mut self, chunked: bool) {
        self.chunked = chunked;
    }

    pub fn is_chunked(&self) -> bool {
        self.chunked
    }

    /// Renders the response into wire bytes.
    ///
    /// `keep_alive` selects the connection header; `head_only` suppresses
    /// the body while keeping the advertised content-length (HEAD requests).
    pub fn render(&self, keep_alive: bool, head_only: bool) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.body.len() + 256);

        buf.put_slice(b"HTTP/1.1 ");
        buf.put_slice(self.status.code().to_string().as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(self.status.reason().as_bytes());
        buf.put_slice(b"\r\n");

        buf.put_slice(b"server: ");
        buf.put_slice(crate::SERVER_NAME.as_bytes());
        buf.put_u8(b'/');
        buf.put_slice(crate::VERSION.as_bytes());
        buf.put_slice(b"\r\n");

        buf.put_slice(b"connection: ");
        buf.put_slice(if keep_alive { b"Keep-Alive" } else { b"Close" });
        buf.put_slice(b"\r\n");

        if let Some(content_type) = &self.content_type {
            buf.put_slice(b"content-type: ");
            buf.put_slice(content_type.as_bytes());
            buf.put_slice(b"\r\n");
        }

        for (name, value) in &self.headers {
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }

        if self.chunked {
            buf.put_slice(b"transfer-encoding: chunked\r\n\r\n");
            if !head_only && !self.body.is_empty() {
                buf.put_slice(&chunk_frame(&self.body));
            }
        } else {
            buf.put_slice(b"content-length: ");
            buf.put_slice(self.body.len().to_string().as_bytes());
            buf.put_slice(b"\r\n\r\n");
            if !head_only {
                buf.put_slice(&self.body);
            }
        }

        buf.freeze()
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new(HttpStatus::SERVER_ERROR)
    }
}

/// Frames a payload as a single chunk of a chunked transfer.
pub fn chunk_frame(data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(data.len() + 16);
    buf.put_slice(format!("{:x}\r\n", data.len()).as_bytes());
    buf.put_slice(data);
    buf.put_slice(b"\r\n");
    buf.freeze()
}
