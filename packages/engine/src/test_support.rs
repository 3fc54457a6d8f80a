// packages/engine/src/test_support.rs
//! Fakes for exercising the lifecycle logic without a real spoofing server

use crate::extension::HostControl;
use crate::runtime::spoofing_service::{SpoofingService, GRACEFUL_STOP_SIGNATURE};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};

/// Spoofing service whose `start` resolves when told to
pub(crate) struct FakeService {
    exit_tx: Mutex<Option<oneshot::Sender<String>>>,
    exit_rx: Mutex<Option<oneshot::Receiver<String>>>,
    started: Notify,
    addresses: Mutex<Vec<String>>,
    stops: AtomicUsize,
    stop_error: String,
}

impl FakeService {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_stop_error("")
    }

    /// `stop` returns `error` and does not terminate the server
    pub(crate) fn with_stop_error(error: &str) -> Arc<Self> {
        let (tx, rx) = oneshot::channel();
        Arc::new(Self {
            exit_tx: Mutex::new(Some(tx)),
            exit_rx: Mutex::new(Some(rx)),
            started: Notify::new(),
            addresses: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            stop_error: error.to_string(),
        })
    }

    /// Make the pending `start` call return `message`
    pub(crate) fn terminate(&self, message: &str) {
        if let Some(tx) = self.exit_tx.lock().take() {
            let _ = tx.send(message.to_string());
        }
    }

    /// Resolve once `start` has been entered
    pub(crate) async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub(crate) fn addresses(&self) -> Vec<String> {
        self.addresses.lock().clone()
    }

    pub(crate) fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpoofingService for FakeService {
    async fn start(&self, address: &str) -> String {
        self.addresses.lock().push(address.to_string());
        let rx = self.exit_rx.lock().take();
        self.started.notify_one();

        match rx {
            Some(rx) => rx.await.unwrap_or_default(),
            None => String::new(),
        }
    }

    async fn stop(&self) -> String {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.stop_error.is_empty() {
            self.terminate(&format!("{} by request", GRACEFUL_STOP_SIGNATURE));
        }
        self.stop_error.clone()
    }
}

/// Host that records unload requests
#[derive(Default)]
pub(crate) struct RecordingHost {
    unloads: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub(crate) fn unload_count(&self) -> usize {
        self.unloads.lock().len()
    }
}

impl HostControl for RecordingHost {
    fn unload_extension(&self, reason: &str) {
        self.unloads.lock().push(reason.to_string());
    }
}
