// packages/engine/src/interception/message.rs
//! Host-neutral HTTP message model
//!
//! An intercepted request carries its destination service separately from
//! the request itself, the way an intercepting proxy tool hands it over:
//! the request line and `Host` header stay as the client wrote them while
//! the service says where the bytes will actually be sent.

use crate::utils::errors::{EngineError, Result};
use bytes::Bytes;
use hyper::{Request, Response, Uri};
use std::fmt;
use std::str::FromStr;

/// Protocol scheme of a destination service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl FromStr for Scheme {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("http") {
            Ok(Scheme::Http)
        } else if s.eq_ignore_ascii_case("https") {
            Ok(Scheme::Https)
        } else {
            Err(EngineError::InterceptionFailed(format!("Unsupported scheme '{}'", s)))
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a request is sent: host, port and scheme
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpService {
    pub host: String,
    pub port: u16,
    pub scheme: Scheme,
}

impl HttpService {
    pub fn new(host: impl Into<String>, port: u16, scheme: Scheme) -> Self {
        Self {
            host: host.into(),
            port,
            scheme,
        }
    }

    /// Service named by an absolute-form URI (`https://example.com/a`)
    pub fn from_uri(uri: &Uri) -> Result<Self> {
        let scheme: Scheme = uri
            .scheme_str()
            .ok_or_else(|| EngineError::InterceptionFailed(format!("URI '{}' has no scheme", uri)))?
            .parse()?;

        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| EngineError::InterceptionFailed(format!("URI '{}' has no host", uri)))?;

        Ok(Self::new(host, uri.port_u16().unwrap_or(scheme.default_port()), scheme))
    }

    /// `scheme://host:port`, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl fmt::Display for HttpService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}

/// A request on its way out, plus the service it is bound for
#[derive(Debug)]
pub struct OutboundRequest {
    pub service: HttpService,
    pub request: Request<Bytes>,
}

impl OutboundRequest {
    pub fn new(service: HttpService, request: Request<Bytes>) -> Self {
        Self { service, request }
    }
}

/// Any message crossing the interception hook
#[derive(Debug)]
pub enum HttpMessage {
    Request(OutboundRequest),
    Response(Response<Bytes>),
}

impl HttpMessage {
    pub fn is_request(&self) -> bool {
        matches!(self, HttpMessage::Request(_))
    }
}
