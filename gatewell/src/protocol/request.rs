//! HTTP request representation and head parsing.

use super::{MAXIMAL_BODY_SIZE, MAXIMAL_HEADER_SIZE, MAXIMAL_URI_LENGTH};
use crate::comm::TaskId;
use crate::error::ServerError;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

/// Maximal number of header fields accepted per request.
const MAX_HEADER_FIELDS: usize = 64;

/// HTTP request methods understood by the core.
///
/// Anything else is answered with 405 and a connection close, because the
/// read stream position can no longer be trusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
    Options,
}

impl HttpMethod {
    /// Parses a method token, returning `None` for unknown methods.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            "HEAD" => Some(Self::Head),
            "PATCH" => Some(Self::Patch),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    /// Returns the wire token of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Patch => "PATCH",
            Self::Options => "OPTIONS",
        }
    }

    /// Returns true if a body is expected for this method.
    pub fn expects_body(self) -> bool {
        matches!(
            self,
            Self::Post | Self::Put | Self::Patch | Self::Delete | Self::Options
        )
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed request head, produced before the body has been read.
#[derive(Debug)]
pub struct RequestHead {
    /// Request method.
    pub method: HttpMethod,
    /// Path portion of the request target (query string stripped).
    pub path: String,
    /// Decoded query parameters.
    pub params: HashMap<String, String>,
    /// Header fields with lowercased names.
    pub headers: HashMap<String, String>,
    /// True for HTTP/1.1, false for HTTP/1.0.
    pub version_11: bool,
    /// Byte length of the head including the terminating blank line.
    pub header_len: usize,
    /// Declared body length (0 when absent).
    pub content_length: usize,
    /// Whether the interim 100-continue response has been sent.
    pub continue_sent: bool,
}

impl RequestHead {
    /// Looks up a header by its lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// True if the client asked for a 100-continue interim response.
    pub fn expects_continue(&self) -> bool {
        self.header("expect")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("100-continue"))
    }
}

/// A complete HTTP request as handed to a handler.
///
/// The handler owns the request for the rest of its lifetime; the comm task
/// keeps no reference once the handler has been created.
#[derive(Debug)]
pub struct HttpRequest {
    method: HttpMethod,
    path: String,
    params: HashMap<String, String>,
    headers: HashMap<String, String>,
    version_11: bool,
    body: Bytes,
    client_task_id: TaskId,
}

impl HttpRequest {
    /// Assembles a request from a parsed head and its body bytes.
    pub fn new(head: RequestHead, body: Bytes, client_task_id: TaskId) -> Self {
        Self {
            method: head.method,
            path: head.path,
            params: head.params,
            headers: head.headers,
            version_11: head.version_11,
            body,
            client_task_id,
        }
    }

    /// Builds a request directly, for handler unit tests.
    pub fn synthetic(method: HttpMethod, path: &str) -> Self {
        let (path, params) = split_target(path);
        Self {
            method,
            path,
            params,
            headers: HashMap::new(),
            version_11: true,
            body: Bytes::new(),
            client_task_id: TaskId::invalid(),
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the path split into non-empty segments.
    pub fn path_segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Looks up a query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Looks up a header by its lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Sets a header, for handler unit tests.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_lowercase(), value.to_string());
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_http10(&self) -> bool {
        !self.version_11
    }

    /// Identity of the comm task this request arrived on.
    pub fn client_task_id(&self) -> TaskId {
        self.client_task_id
    }
}

/// Parses a request head from the start of `buf`.
///
/// Returns `Ok(None)` while the head is still incomplete. A complete head
/// consumes `header_len` bytes of the buffer; the body follows directly.
pub fn parse_request_head(buf: &[u8]) -> Result<Option<RequestHead>, ServerError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_FIELDS];
    let mut parsed = httparse::Request::new(&mut headers);

    let header_len = match parsed.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => {
            if buf.len() > MAXIMAL_HEADER_SIZE {
                return Err(ServerError::HeaderTooLarge { size: buf.len() });
            }
            return Ok(None);
        }
        Err(e) => return Err(ServerError::BadRequest(e.to_string())),
    };

    if header_len > MAXIMAL_HEADER_SIZE {
        return Err(ServerError::HeaderTooLarge { size: header_len });
    }

    let method_token = parsed
        .method
        .ok_or_else(|| ServerError::BadRequest("missing method".to_string()))?;
    let method = HttpMethod::parse(method_token).ok_or(ServerError::MethodNotAllowed)?;

    let target = parsed
        .path
        .ok_or_else(|| ServerError::BadRequest("missing request target".to_string()))?;
    if target.len() > MAXIMAL_URI_LENGTH {
        return Err(ServerError::UriTooLong);
    }

    let version_11 = match parsed.version {
        Some(0) => false,
        Some(1) => true,
        _ => {
            return Err(ServerError::BadRequest(
                "unsupported http version".to_string(),
            ))
        }
    };

    let mut header_map = HashMap::with_capacity(parsed.headers.len());
    for field in parsed.headers.iter() {
        let value = std::str::from_utf8(field.value)
            .map_err(|_| ServerError::BadRequest("non-utf8 header value".to_string()))?;
        header_map.insert(field.name.to_lowercase(), value.trim().to_string());
    }

    let content_length = match header_map.get("content-length") {
        Some(raw) => {
            let length: i64 = raw
                .parse()
                .map_err(|_| ServerError::LengthRequired)?;
            if length < 0 {
                return Err(ServerError::LengthRequired);
            }
            let length = length as usize;
            if length > MAXIMAL_BODY_SIZE {
                return Err(ServerError::BodyTooLarge { size: length });
            }
            length
        }
        None => 0,
    };

    if content_length > 0 && !method.expects_body() {
        // Not forbidden by the protocol; read the body anyway but warn.
        tracing::warn!(method = %method, "request with a body on a body-less method");
    }

    let (path, params) = split_target(target);

    Ok(Some(RequestHead {
        method,
        path,
        params,
        headers: header_map,
        version_11,
        header_len,
        content_length,
        continue_sent: false,
    }))
}

/// Splits a request target into path and query parameters.
fn split_target(target: &str) -> (String, HashMap<String, String>) {
    match target.split_once('?') {
        Some((path, query)) => {
            let mut params = HashMap::new();
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                match pair.split_once('=') {
                    Some((name, value)) => params.insert(name.to_string(), value.to_string()),
                    None => params.insert(pair.to_string(), String::new()),
                };
            }
            (path.to_string(), params)
        }
        None => (target.to_string(), HashMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_head() {
        let raw = b"GET /debug?sleep=2&block=true HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n";
        let head = parse_request_head(raw).unwrap().unwrap();

        assert_eq!(head.method, HttpMethod::Get);
        assert_eq!(head.path, "/debug");
        assert_eq!(head.params.get("sleep").map(String::as_str), Some("2"));
        assert_eq!(head.params.get("block").map(String::as_str), Some("true"));
        assert_eq!(head.header("connection"), Some("keep-alive"));
        assert!(head.version_11);
        assert_eq!(head.header_len, raw.len());
        assert_eq!(head.content_length, 0);
    }

    #[test]
    fn test_parse_partial_head() {
        let raw = b"GET /debug HTTP/1.1\r\nHost: local";
        assert!(parse_request_head(raw).unwrap().is_none());
    }

    #[test]
    fn test_parse_content_length() {
        let raw = b"POST /job HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello world";
        let head = parse_request_head(raw).unwrap().unwrap();
        assert_eq!(head.content_length, 11);
        assert_eq!(head.header_len, raw.len() - 11);
    }

    #[test]
    fn test_parse_unknown_method() {
        let raw = b"BREW /coffee HTTP/1.1\r\n\r\n";
        assert!(matches!(
            parse_request_head(raw),
            Err(ServerError::MethodNotAllowed)
        ));
    }

    #[test]
    fn test_parse_bad_request_line() {
        let raw = b"total garbage\r\n\r\n";
        assert!(matches!(
            parse_request_head(raw),
            Err(ServerError::BadRequest(_))
        ));
    }

    #[test]
    fn test_parse_negative_content_length() {
        let raw = b"POST /job HTTP/1.1\r\nContent-Length: -5\r\n\r\n";
        assert!(matches!(
            parse_request_head(raw),
            Err(ServerError::LengthRequired)
        ));
    }

    #[test]
    fn test_http10_detection() {
        let raw = b"GET / HTTP/1.0\r\n\r\n";
        let head = parse_request_head(raw).unwrap().unwrap();
        assert!(!head.version_11);
    }

    #[test]
    fn test_expects_continue() {
        let raw = b"PUT /doc HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 4\r\n\r\n";
        let head = parse_request_head(raw).unwrap().unwrap();
        assert!(head.expects_continue());
    }

    #[test]
    fn test_request_accessors() {
        let raw = b"GET /job/17 HTTP/1.1\r\nX-Gatewell-Async: store\r\n\r\n";
        let head = parse_request_head(raw).unwrap().unwrap();
        let request = HttpRequest::new(head, Bytes::new(), TaskId::invalid());

        assert_eq!(request.path_segments(), vec!["job", "17"]);
        assert_eq!(request.header("x-gatewell-async"), Some("store"));
        assert!(!request.is_http10());
    }

    #[test]
    fn test_method_expects_body() {
        assert!(HttpMethod::Post.expects_body());
        assert!(HttpMethod::Put.expects_body());
        assert!(!HttpMethod::Get.expects_body());
        assert!(!HttpMethod::Head.expects_body());
    }
}
