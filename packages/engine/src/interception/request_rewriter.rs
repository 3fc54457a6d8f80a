// packages/engine/src/interception/request_rewriter.rs
//! Request rewriter
//!
//! Turns an intercepted request into a request against the control-plane
//! address. The true destination travels in a JSON config header so the
//! spoofing server can dial it with the configured TLS fingerprint.
//!
//! ```text
//! GET /a  (service https://example.com:443)
//!     │
//!     ├─ build TransportConfig from settings
//!     ├─ append  awesometlsconfig: {"Host":"example.com",...}
//!     └─ retarget service → https://127.0.0.1:8887
//! ```
//!
//! Method, request target, existing headers and body are left untouched.

use crate::interception::message::{HttpService, OutboundRequest, Scheme};
use crate::interception::transport_config::TransportConfig;
use crate::observability::{REQUESTS_REWRITTEN, REWRITE_FAILURES};
use crate::settings::ExtensionSettings;
use crate::utils::errors::{EngineError, Result};
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Request, Uri};
use tracing::{debug, info};

/// Header carrying the serialised [`TransportConfig`]
pub const TRANSPORT_CONFIG_HEADER: &str = "awesometlsconfig";

/// Parse a persisted `host:port` control-plane address
///
/// The control plane is always reached over HTTPS, so a missing port
/// means 443.
pub fn parse_control_plane(address: &str) -> Result<HttpService> {
    let address = address.trim();
    if address.is_empty() {
        return Err(EngineError::RewriteFailed("control-plane address is empty".into()));
    }

    let uri: Uri = format!("https://{}", address).parse().map_err(|e| {
        EngineError::RewriteFailed(format!("invalid control-plane address '{}': {}", address, e))
    })?;

    let host = uri.host().filter(|h| !h.is_empty()).ok_or_else(|| {
        EngineError::RewriteFailed(format!("control-plane address '{}' has no host", address))
    })?;

    // `Uri::port_u16` yields None for a malformed port, so check it here
    let authority = uri.authority().map(|a| a.as_str()).unwrap_or_default();
    let port = match authority.rfind(':') {
        Some(idx) if !authority[idx..].contains(']') => {
            let raw = &authority[idx + 1..];
            raw.parse::<u16>().map_err(|_| {
                EngineError::RewriteFailed(format!(
                    "invalid port '{}' in control-plane address '{}'",
                    raw, address
                ))
            })?
        }
        _ => Scheme::Https.default_port(),
    };

    Ok(HttpService::new(host, port, Scheme::Https))
}

/// Rewrites intercepted requests toward the control plane
///
/// Holds no per-request state; safe to share across concurrently handled
/// requests.
#[derive(Clone)]
pub struct RequestRewriter {
    settings: ExtensionSettings,
}

impl RequestRewriter {
    pub fn new(settings: ExtensionSettings) -> Self {
        Self { settings }
    }

    /// Attach the transport config and retarget the request
    pub fn rewrite(&self, outbound: OutboundRequest) -> Result<OutboundRequest> {
        let result = self.rewrite_inner(outbound);
        if result.is_err() {
            metrics::counter!(REWRITE_FAILURES).increment(1);
        }
        result
    }

    fn rewrite_inner(&self, outbound: OutboundRequest) -> Result<OutboundRequest> {
        let OutboundRequest { service, request } = outbound;

        let config_json = TransportConfig::build(&service, &self.settings)?.to_header_value()?;
        info!(config = %config_json, "Using transport config");

        let header_value = HeaderValue::from_str(&config_json).map_err(|e| {
            EngineError::RewriteFailed(format!("transport config is not a valid header value: {}", e))
        })?;

        let control_plane = parse_control_plane(&self.settings.address()?)?;

        let (mut parts, body) = request.into_parts();
        parts
            .headers
            .append(HeaderName::from_static(TRANSPORT_CONFIG_HEADER), header_value);

        debug!("Redirecting {} {} from {} to {}", parts.method, parts.uri, service, control_plane);
        metrics::counter!(REQUESTS_REWRITTEN).increment(1);

        Ok(OutboundRequest::new(control_plane, Request::from_parts(parts, body)))
    }
}
