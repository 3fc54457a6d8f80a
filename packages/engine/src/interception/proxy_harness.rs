// packages/engine/src/interception/proxy_harness.rs
//! Standalone interception harness
//!
//! A plain HTTP proxy that plays the host role for the extension hooks:
//! every proxied request goes through `on_outbound_request` and is forwarded
//! to wherever the rewritten service points (the control plane, over HTTPS).
//! Responses go back through `process_http_message` unchanged.
//!
//! Accepts absolute-form requests (`GET http://example.com/a`) and
//! origin-form requests with a `Host` header. CONNECT tunnels are refused:
//! the harness does not terminate TLS.

use crate::extension::ExtensionHooks;
use crate::interception::message::{HttpMessage, HttpService, OutboundRequest};
use crate::utils::config::HarnessSection;
use crate::utils::errors::{EngineError, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONNECTION, HOST, TRANSFER_ENCODING};
use hyper::http::request::Parts;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

/// Configuration for the proxy harness
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Proxy listen address
    pub listen_addr: SocketAddr,

    /// Enable request logging
    pub log_requests: bool,

    /// Enable response logging
    pub log_responses: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_requests: true,
            log_responses: false,
        }
    }
}

impl TryFrom<&HarnessSection> for HarnessConfig {
    type Error = EngineError;

    fn try_from(section: &HarnessSection) -> Result<Self> {
        let listen_addr = section.listen_addr.parse().map_err(|e| {
            EngineError::ConfigError(format!(
                "Invalid harness listen address '{}': {}",
                section.listen_addr, e
            ))
        })?;

        Ok(Self {
            listen_addr,
            log_requests: section.log_requests,
            log_responses: section.log_responses,
        })
    }
}

/// Proxy that drives the extension hooks
pub struct ProxyHarness {
    config: HarnessConfig,
    hooks: Arc<dyn ExtensionHooks>,
    client: reqwest::Client,
}

impl ProxyHarness {
    /// Create a harness around `hooks`
    ///
    /// The upstream client accepts self-signed certificates: the control
    /// plane is a local listener with a generated certificate.
    pub fn new(config: HarnessConfig, hooks: Arc<dyn ExtensionHooks>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| EngineError::InterceptionFailed(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            config,
            hooks,
            client,
        })
    }

    /// Bind the configured listen address
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.config.listen_addr).await.map_err(|e| {
            EngineError::InterceptionFailed(format!("Failed to bind proxy: {}", e))
        })
    }

    /// Bind and serve until the task is dropped
    pub async fn start(self: Arc<Self>) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        info!("Proxy harness listening on {}", listener.local_addr()?);

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let harness = Arc::clone(&self);

                    tokio::spawn(async move {
                        debug!("Accepted connection from {}", addr);

                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let harness = Arc::clone(&harness);
                            async move { Ok::<_, Infallible>(harness.handle_request(req).await) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Handle one proxied request
    async fn handle_request(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let request_id = Ulid::new();
        let (parts, body) = req.into_parts();

        if self.config.log_requests {
            self.log_request(request_id, &parts.method, &parts.uri, &parts.headers);
        }

        if parts.method == Method::CONNECT {
            return error_response(
                StatusCode::NOT_IMPLEMENTED,
                "CONNECT tunnels are not supported by this proxy",
            );
        }

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(%request_id, "Body read error: {}", e);
                return error_response(StatusCode::BAD_REQUEST, "Failed to read request body");
            }
        };

        let outbound = match to_outbound(parts, body) {
            Ok(outbound) => outbound,
            Err(e) => {
                warn!(%request_id, "{}", e);
                return error_response(StatusCode::BAD_REQUEST, &e.to_string());
            }
        };

        let rewritten = match self.hooks.on_outbound_request(outbound) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                warn!(%request_id, "Request refused: {}", e);
                return error_response(StatusCode::BAD_GATEWAY, &format!("Request refused: {}", e));
            }
        };

        let response = match self.forward(rewritten).await {
            Ok(response) => response,
            Err(e) => {
                error!(%request_id, "{}", e);
                return error_response(StatusCode::BAD_GATEWAY, "Failed to reach the control plane");
            }
        };

        match self.hooks.process_http_message(HttpMessage::Response(response)) {
            Ok(HttpMessage::Response(response)) => {
                if self.config.log_responses {
                    self.log_response(request_id, &response);
                }
                let (parts, body) = response.into_parts();
                Response::from_parts(parts, Full::new(body))
            }
            Ok(HttpMessage::Request(_)) => {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Response hook returned a request")
            }
            Err(e) => error_response(StatusCode::BAD_GATEWAY, &e.to_string()),
        }
    }

    /// Send a rewritten request to its service
    async fn forward(&self, outbound: OutboundRequest) -> Result<Response<Bytes>> {
        let OutboundRequest { service, request } = outbound;
        let (parts, body) = request.into_parts();

        let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let url = format!("{}{}", service.base_url(), path_and_query);

        let upstream = self
            .client
            .request(parts.method, &url)
            .headers(parts.headers)
            .body(body)
            .send()
            .await
            .map_err(|e| EngineError::InterceptionFailed(format!("Control-plane request failed: {}", e)))?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        headers.remove(TRANSFER_ENCODING);
        headers.remove(CONNECTION);

        let body = upstream.bytes().await.map_err(|e| {
            EngineError::InterceptionFailed(format!("Response body error: {}", e))
        })?;

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    fn log_request(&self, request_id: Ulid, method: &Method, uri: &Uri, headers: &HeaderMap) {
        debug!(%request_id, "Request: {} {}", method, uri);
        for (name, value) in headers {
            if let Ok(val_str) = value.to_str() {
                debug!(%request_id, "  {}: {}", name, val_str);
            }
        }
    }

    fn log_response(&self, request_id: Ulid, response: &Response<Bytes>) {
        debug!(%request_id, "Response: {} ({} bytes)", response.status(), response.body().len());
    }
}

/// Turn a proxied request into an [`OutboundRequest`] with an origin-form target
fn to_outbound(mut parts: Parts, body: Bytes) -> Result<OutboundRequest> {
    let service = if parts.uri.scheme().is_some() {
        HttpService::from_uri(&parts.uri)?
    } else {
        let host = parts
            .headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                EngineError::InterceptionFailed("Request has neither an absolute URI nor a Host header".into())
            })?;
        let uri: Uri = format!("http://{}", host).parse().map_err(|e| {
            EngineError::InterceptionFailed(format!("Invalid Host header '{}': {}", host, e))
        })?;
        HttpService::from_uri(&uri)?
    };

    if !parts.headers.contains_key(HOST) {
        if let Some(authority) = parts.uri.authority() {
            let value = HeaderValue::from_str(authority.as_str()).map_err(|e| {
                EngineError::InterceptionFailed(format!("Invalid authority: {}", e))
            })?;
            parts.headers.insert(HOST, value);
        }
    }
    parts.headers.remove("proxy-connection");

    let origin_form: Uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .parse()
        .map_err(|e| EngineError::InterceptionFailed(format!("Invalid request target: {}", e)))?;
    parts.uri = origin_form;

    Ok(OutboundRequest::new(service, Request::from_parts(parts, body)))
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(message.to_string())));
    *response.status_mut() = status;
    response
}
