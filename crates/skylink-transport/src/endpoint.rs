//! Server endpoint addressing

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Result, TransportError};

/// A `ws://` or `wss://` server address with its port resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    secure: bool,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>, secure: bool) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Self {
            secure,
            host: host.into(),
            port,
            path,
        }
    }

    /// Parse a URL; the scheme picks TLS and the default port (80 or 443)
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input)?;
        let secure = match url.scheme() {
            "ws" => false,
            "wss" => true,
            other => return Err(TransportError::UnsupportedScheme(other.to_string())),
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TransportError::InvalidUrl(format!("missing host in {}", input)))?;
        let port = url
            .port_or_known_default()
            .unwrap_or(if secure { 443 } else { 80 });

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self::new(host, port, path, secure))
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path including any query string
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}{}", self.scheme(), self.host, self.port, self.path)
    }
}
