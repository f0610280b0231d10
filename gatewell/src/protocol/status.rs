//! HTTP status codes used by the core.

use std::fmt;

/// An HTTP status code with its reason phrase.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HttpStatus(u16);

impl HttpStatus {
    pub const CONTINUE: HttpStatus = HttpStatus(100);
    pub const OK: HttpStatus = HttpStatus(200);
    pub const CREATED: HttpStatus = HttpStatus(201);
    pub const ACCEPTED: HttpStatus = HttpStatus(202);
    pub const NO_CONTENT: HttpStatus = HttpStatus(204);
    pub const BAD_REQUEST: HttpStatus = HttpStatus(400);
    pub const FORBIDDEN: HttpStatus = HttpStatus(403);
    pub const NOT_FOUND: HttpStatus = HttpStatus(404);
    pub const METHOD_NOT_ALLOWED: HttpStatus = HttpStatus(405);
    pub const CONFLICT: HttpStatus = HttpStatus(409);
    pub const GONE: HttpStatus = HttpStatus(410);
    pub const LENGTH_REQUIRED: HttpStatus = HttpStatus(411);
    pub const PAYLOAD_TOO_LARGE: HttpStatus = HttpStatus(413);
    pub const URI_TOO_LONG: HttpStatus = HttpStatus(414);
    pub const HEADER_FIELDS_TOO_LARGE: HttpStatus = HttpStatus(431);
    pub const CLIENT_CLOSED_REQUEST: HttpStatus = HttpStatus(499);
    pub const SERVER_ERROR: HttpStatus = HttpStatus(500);
    pub const SERVICE_UNAVAILABLE: HttpStatus = HttpStatus(503);
    pub const VERSION_NOT_SUPPORTED: HttpStatus = HttpStatus(505);

    /// Creates a status from a raw code.
    pub fn from_code(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric status code.
    pub fn code(self) -> u16 {
        self.0
    }

    /// Returns the reason phrase for the status line.
    pub fn reason(self) -> &'static str {
        match self.0 {
            100 => "Continue",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            409 => "Conflict",
            410 => "Gone",
            411 => "Length Required",
            413 => "Payload Too Large",
            414 => "URI Too Long",
            431 => "Request Header Fields Too Large",
            499 => "Client Closed Request",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            505 => "HTTP Version Not Supported",
            _ => "Unknown",
        }
    }

    /// Returns true for 4xx and 5xx codes.
    pub fn is_error(self) -> bool {
        self.0 >= 400
    }
}

impl fmt::Debug for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HttpStatus({} {})", self.0, self.reason())
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_and_reason() {
        assert_eq!(HttpStatus::OK.code(), 200);
        assert_eq!(HttpStatus::OK.reason(), "OK");
        assert_eq!(HttpStatus::SERVICE_UNAVAILABLE.code(), 503);
        assert_eq!(HttpStatus::SERVICE_UNAVAILABLE.reason(), "Service Unavailable");
    }

    #[test]
    fn test_is_error() {
        assert!(!HttpStatus::OK.is_error());
        assert!(!HttpStatus::NO_CONTENT.is_error());
        assert!(HttpStatus::BAD_REQUEST.is_error());
        assert!(HttpStatus::SERVER_ERROR.is_error());
    }

    #[test]
    fn test_unknown_code() {
        let status = HttpStatus::from_code(418);
        assert_eq!(status.code(), 418);
        assert_eq!(status.reason(), "Unknown");
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", HttpStatus::NOT_FOUND), "404 Not Found");
    }
}
