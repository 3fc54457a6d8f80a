// packages/engine/src/interception/mod.rs
//! Request interception layer
//!
//! - **Message**: Host-neutral request/response model with destination services
//! - **Transport Config**: Per-request configuration for the spoofing server
//! - **Request Rewriter**: Injects the config header and retargets to the control plane
//! - **Proxy Harness**: Standalone HTTP proxy driving the extension hooks
//!
//! # Architecture
//!
//! ```text
//! Client ─▶ Proxy Harness ─▶ on_outbound_request ─▶ Request Rewriter
//!                                                        │
//!                        https://<control plane> ◀───────┘
//!                                 │  (awesometlsconfig header)
//!                                 ▼
//!                          Spoofing server ─▶ real destination
//! ```

pub mod message;
pub mod proxy_harness;
pub mod request_rewriter;
pub mod transport_config;

// Re-export commonly used types
pub use message::{HttpMessage, HttpService, OutboundRequest, Scheme};
pub use proxy_harness::{HarnessConfig, ProxyHarness};
pub use request_rewriter::{parse_control_plane, RequestRewriter, TRANSPORT_CONFIG_HEADER};
pub use transport_config::TransportConfig;
