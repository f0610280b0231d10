//! Listening endpoint descriptions.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

/// A listening endpoint: address, port, and encryption flag.
///
/// Encrypted endpoints are accepted syntactically (`ssl://`) so configs
/// stay portable, but binding one fails: TLS termination is an external
/// collaborator, not part of this core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub address: SocketAddr,
    pub encrypted: bool,
}

impl Endpoint {
    /// Creates a plain TCP endpoint.
    pub fn tcp(address: SocketAddr) -> Self {
        Self {
            address,
            encrypted: false,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.encrypted { "ssl" } else { "tcp" };
        write!(f, "{}://{}", scheme, self.address)
    }
}

/// Errors parsing an endpoint specification.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    #[error("unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid endpoint address: {0}")]
    InvalidAddress(String),
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    /// Parses `tcp://host:port`, `ssl://host:port`, or a bare `host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = match s.split_once("://") {
            Some((scheme, rest)) => (scheme, rest),
            None => ("tcp", s),
        };

        let encrypted = match scheme {
            "tcp" | "http" => false,
            "ssl" | "https" => true,
            other => return Err(EndpointParseError::UnsupportedScheme(other.to_string())),
        };

        let address = rest
            .parse()
            .map_err(|_| EndpointParseError::InvalidAddress(rest.to_string()))?;

        Ok(Self { address, encrypted })
    }
}
