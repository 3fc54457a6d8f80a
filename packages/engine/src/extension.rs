// packages/engine/src/extension.rs
//! Extension entry points
//!
//! The extension exposes the two hooks a host drives:
//!
//! - `on_outbound_request`: rewrite an intercepted request toward the control plane
//! - `on_shutdown`: stop the spoofing server when the host unloads the extension
//!
//! Loading the extension launches the spoofing server. Anything that would let
//! traffic leave outside the spoofing path (an unusable control-plane address,
//! a crashed server) trips the [`FailSafe`], which asks the host to unload
//! and refuses every later request.

use crate::interception::message::{HttpMessage, OutboundRequest};
use crate::interception::request_rewriter::RequestRewriter;
use crate::observability::EXTENSION_DISABLED;
use crate::runtime::spoofing_service::SpoofingService;
use crate::runtime::supervisor::ServerSupervisor;
use crate::settings::ExtensionSettings;
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Callbacks the host offers to the extension
pub trait HostControl: Send + Sync {
    /// Disable and unload the extension
    fn unload_extension(&self, reason: &str);
}

/// Hooks the host invokes on the extension
#[async_trait]
pub trait ExtensionHooks: Send + Sync {
    /// Rewrite an outbound request. An error means the request must not be sent.
    fn on_outbound_request(&self, request: OutboundRequest) -> Result<OutboundRequest>;

    /// Called once when the host unloads the extension
    async fn on_shutdown(&self);

    /// Route any intercepted message; responses pass through untouched
    fn process_http_message(&self, message: HttpMessage) -> Result<HttpMessage> {
        match message {
            HttpMessage::Request(request) => self.on_outbound_request(request).map(HttpMessage::Request),
            response @ HttpMessage::Response(_) => Ok(response),
        }
    }
}

/// One-way switch that disables the extension
pub struct FailSafe {
    tripped: AtomicBool,
    reason: Mutex<Option<String>>,
    host: Arc<dyn HostControl>,
}

impl FailSafe {
    pub fn new(host: Arc<dyn HostControl>) -> Self {
        Self {
            tripped: AtomicBool::new(false),
            reason: Mutex::new(None),
            host,
        }
    }

    /// Disable the extension. Only the first call reaches the host; returns
    /// whether this call was it.
    pub fn trip(&self, reason: &str) -> bool {
        {
            let mut slot = self.reason.lock();
            if slot.is_some() {
                debug!("Fail-safe already tripped, ignoring: {}", reason);
                return false;
            }
            *slot = Some(reason.to_string());
        }
        self.tripped.store(true, Ordering::SeqCst);

        error!("Disabling extension: {}", reason);
        metrics::counter!(EXTENSION_DISABLED).increment(1);
        self.host.unload_extension(reason);
        true
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Why the fail-safe tripped
    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }
}

/// The loaded extension
pub struct Extension {
    settings: ExtensionSettings,
    rewriter: RequestRewriter,
    supervisor: ServerSupervisor,
    fail_safe: Arc<FailSafe>,
    shutdown_grace: Duration,
}

impl Extension {
    pub const NAME: &'static str = "tlsmasq";

    /// Load the extension and launch the spoofing server on the configured
    /// control-plane address. Must be called inside a Tokio runtime.
    pub fn load(
        settings: ExtensionSettings,
        service: Arc<dyn SpoofingService>,
        host: Arc<dyn HostControl>,
    ) -> Result<Self> {
        let fail_safe = Arc::new(FailSafe::new(host));
        let supervisor = ServerSupervisor::new(service, Arc::clone(&fail_safe));

        supervisor.start(settings.address()?)?;
        info!("{} extension loaded", Self::NAME);

        Ok(Self {
            rewriter: RequestRewriter::new(settings.clone()),
            settings,
            supervisor,
            fail_safe,
            shutdown_grace: Duration::from_secs(5),
        })
    }

    /// How long `on_shutdown` waits for the server to report termination
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn settings(&self) -> &ExtensionSettings {
        &self.settings
    }

    pub fn supervisor(&self) -> &ServerSupervisor {
        &self.supervisor
    }

    pub fn is_disabled(&self) -> bool {
        self.fail_safe.is_tripped()
    }
}

#[async_trait]
impl ExtensionHooks for Extension {
    fn on_outbound_request(&self, request: OutboundRequest) -> Result<OutboundRequest> {
        if self.fail_safe.is_tripped() {
            return Err(EngineError::ExtensionDisabled(
                self.fail_safe.reason().unwrap_or_default(),
            ));
        }

        self.rewriter.rewrite(request).map_err(|e| {
            error!("{}", e);
            if e.is_fatal() {
                self.fail_safe.trip(&e.to_string());
            }
            e
        })
    }

    async fn on_shutdown(&self) {
        let was_active = self.supervisor.state().is_active();

        if let Err(e) = self.supervisor.stop().await {
            error!("{}", e);
        }

        if was_active {
            match tokio::time::timeout(self.shutdown_grace, self.supervisor.wait_for_termination()).await {
                Ok(state) => debug!("Spoofing server final state: {:?}", state),
                Err(_) => warn!(
                    "Spoofing server did not report termination within {:?}",
                    self.shutdown_grace
                ),
            }
        }

        info!("{} extension unloaded", Self::NAME);
    }
}

/// [`HostControl`] for a standalone process: records the unload request so
/// the owner can wind down
pub struct UnloadSignal {
    tx: watch::Sender<Option<String>>,
}

impl UnloadSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Resolve with the reason once an unload has been requested
    pub async fn unloaded(&self) -> String {
        let mut rx = self.tx.subscribe();
        let result = rx
            .wait_for(Option::is_some)
            .await
            .map(|reason| reason.clone().unwrap_or_default());
        result.unwrap_or_default()
    }

    pub fn is_unloaded(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

impl Default for UnloadSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl HostControl for UnloadSignal {
    fn unload_extension(&self, reason: &str) {
        self.tx.send_replace(Some(reason.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::message::{HttpService, Scheme};
    use crate::interception::request_rewriter::TRANSPORT_CONFIG_HEADER;
    use crate::runtime::supervisor::ServerState;
    use crate::settings::MemorySettingsStore;
    use crate::test_support::{FakeService, RecordingHost};
    use bytes::Bytes;
    use hyper::{Request, Response, StatusCode};

    fn load(service: Arc<FakeService>) -> (Arc<RecordingHost>, Extension) {
        let settings = ExtensionSettings::new(Arc::new(MemorySettingsStore::new())).unwrap();
        let host = Arc::new(RecordingHost::default());
        let extension = Extension::load(settings, service, host.clone())
            .unwrap()
            .with_shutdown_grace(Duration::from_secs(2));
        (host, extension)
    }

    fn outbound() -> OutboundRequest {
        let request = Request::get("/a")
            .header("host", "example.com")
            .body(Bytes::new())
            .unwrap();
        OutboundRequest::new(HttpService::new("example.com", 443, Scheme::Https), request)
    }

    #[tokio::test]
    async fn test_load_starts_server_on_configured_address() {
        let service = FakeService::new();
        let settings = ExtensionSettings::new(Arc::new(MemorySettingsStore::new())).unwrap();
        settings.set_address("127.0.0.1:9443").unwrap();

        let _extension =
            Extension::load(settings, service.clone(), Arc::new(RecordingHost::default())).unwrap();
        service.wait_started().await;

        assert_eq!(service.addresses(), vec!["127.0.0.1:9443"]);
    }

    #[tokio::test]
    async fn test_request_rewritten() {
        let (_, extension) = load(FakeService::new());

        let message = extension.process_http_message(HttpMessage::Request(outbound())).unwrap();
        let HttpMessage::Request(rewritten) = message else {
            panic!("expected a request");
        };

        assert_eq!(rewritten.service, HttpService::new("127.0.0.1", 8887, Scheme::Https));
        assert!(rewritten.request.headers().contains_key(TRANSPORT_CONFIG_HEADER));
    }

    #[tokio::test]
    async fn test_response_passes_through() {
        let (_, extension) = load(FakeService::new());

        let response = Response::builder()
            .status(StatusCode::IM_A_TEAPOT)
            .header("set-cookie", "a=1")
            .header("set-cookie", "b=2")
            .body(Bytes::from_static(b"\x00\xffbody bytes"))
            .unwrap();
        let expected_headers = response.headers().clone();

        let message = extension.process_http_message(HttpMessage::Response(response)).unwrap();
        let HttpMessage::Response(passed) = message else {
            panic!("expected a response");
        };

        assert_eq!(passed.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(passed.headers(), &expected_headers);
        assert_eq!(passed.body().as_ref(), b"\x00\xffbody bytes");
    }

    #[tokio::test]
    async fn test_bad_address_disables_extension() {
        let (host, extension) = load(FakeService::new());
        extension.settings().set_address("::not an address::").unwrap();

        let first = extension.on_outbound_request(outbound());
        assert!(matches!(first, Err(EngineError::RewriteFailed(_))));
        assert!(extension.is_disabled());
        assert_eq!(host.unload_count(), 1);

        // Fixing the address does not re-enable anything
        extension.settings().set_address("127.0.0.1:8887").unwrap();
        let second = extension.on_outbound_request(outbound());
        assert!(matches!(second, Err(EngineError::ExtensionDisabled(_))));
        assert_eq!(host.unload_count(), 1);
    }

    #[tokio::test]
    async fn test_parse_error_refuses_without_disabling() {
        let (host, extension) = load(FakeService::new());
        extension
            .settings()
            .write(crate::settings::SettingKey::IdleConnTimeout, "ninety")
            .unwrap();

        let result = extension.on_outbound_request(outbound());
        assert!(matches!(result, Err(EngineError::SettingParse { .. })));
        assert!(!extension.is_disabled());
        assert_eq!(host.unload_count(), 0);
    }

    #[tokio::test]
    async fn test_fatal_server_exit_disables_extension() {
        let service = FakeService::new();
        let (host, extension) = load(service.clone());

        service.wait_started().await;
        service.terminate("panic: runtime error");
        extension.supervisor().wait_for_termination().await;

        assert!(extension.is_disabled());
        assert_eq!(host.unload_count(), 1);
        assert!(matches!(
            extension.on_outbound_request(outbound()),
            Err(EngineError::ExtensionDisabled(reason)) if reason.contains("panic: runtime error")
        ));
    }

    #[tokio::test]
    async fn test_shutdown_stops_server_gracefully() {
        let service = FakeService::new();
        let (host, extension) = load(service.clone());

        service.wait_started().await;

        extension.on_shutdown().await;

        assert_eq!(service.stop_count(), 1);
        assert!(matches!(extension.supervisor().state(), ServerState::StoppedGraceful(_)));
        assert!(!extension.is_disabled());
        assert_eq!(host.unload_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_survives_stop_error() {
        let service = FakeService::with_stop_error("shutdown failed");
        let (_, extension) = load(service.clone());
        let extension = extension.with_shutdown_grace(Duration::from_millis(50));

        extension.on_shutdown().await;
        assert_eq!(service.stop_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_rewrites() {
        let (_, extension) = load(FakeService::new());
        let extension = Arc::new(extension);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let extension = Arc::clone(&extension);
                tokio::task::spawn_blocking(move || {
                    let host = format!("host{}.example", i);
                    let request = Request::get("/")
                        .header("host", host.as_str())
                        .body(Bytes::new())
                        .unwrap();
                    let outbound =
                        OutboundRequest::new(HttpService::new(host.clone(), 443, Scheme::Https), request);
                    let rewritten = extension.on_outbound_request(outbound).unwrap();
                    let header = rewritten.request.headers()[TRANSPORT_CONFIG_HEADER].to_str().unwrap().to_string();
                    (host, header)
                })
            })
            .collect();

        for handle in handles {
            let (host, header) = handle.await.unwrap();
            let config = crate::interception::TransportConfig::from_header_value(&header).unwrap();
            assert_eq!(config.host, host);
        }
    }

    #[tokio::test]
    async fn test_unload_signal() {
        let signal = Arc::new(UnloadSignal::new());
        assert!(!signal.is_unloaded());

        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.unloaded().await })
        };

        signal.unload_extension("spoofing server crashed");
        assert_eq!(waiter.await.unwrap(), "spoofing server crashed");
        assert!(signal.is_unloaded());
    }
}
