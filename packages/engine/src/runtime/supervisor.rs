// packages/engine/src/runtime/supervisor.rs
//! Spoofing server supervisor
//!
//! Owns the lifetime of the blocking `start` call and decides what its
//! result means:
//!
//! ```text
//! Stopped ──start()──▶ Starting ──▶ Running ──┬─▶ StoppedGraceful   (log, nothing else)
//!                                             └─▶ StoppedFatal      (log, trip fail-safe)
//! ```
//!
//! The `start` call runs on its own task because it does not return until
//! the server is gone. State changes are published on a watch channel.

use crate::extension::FailSafe;
use crate::observability::SERVICE_TERMINATIONS;
use crate::runtime::spoofing_service::{SpoofingService, GRACEFUL_STOP_SIGNATURE};
use crate::utils::errors::{EngineError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Lifecycle state of the spoofing server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    StoppedGraceful(String),
    StoppedFatal(String),
}

impl ServerState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, ServerState::StoppedGraceful(_) | ServerState::StoppedFatal(_))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ServerState::Starting | ServerState::Running)
    }
}

/// How the server ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Shut down on request
    Graceful(String),

    /// Anything else, including an empty result
    Fatal(String),
}

impl Termination {
    /// Classify the message returned by `start`
    pub fn classify(message: &str) -> Self {
        if message.is_empty() {
            Termination::Fatal("spoofing server terminated without reporting a reason".to_string())
        } else if message.contains(GRACEFUL_STOP_SIGNATURE) {
            Termination::Graceful(message.to_string())
        } else {
            Termination::Fatal(message.to_string())
        }
    }
}

/// Supervises one spoofing server for the lifetime of the extension
pub struct ServerSupervisor {
    service: Arc<dyn SpoofingService>,
    fail_safe: Arc<FailSafe>,
    state: Arc<watch::Sender<ServerState>>,
    runner: Mutex<Option<JoinHandle<()>>>,
}

impl ServerSupervisor {
    pub fn new(service: Arc<dyn SpoofingService>, fail_safe: Arc<FailSafe>) -> Self {
        let (state, _) = watch::channel(ServerState::Stopped);
        Self {
            service,
            fail_safe,
            state: Arc::new(state),
            runner: Mutex::new(None),
        }
    }

    /// Launch the server on `address` in the background
    ///
    /// Only valid from `Stopped`; must be called inside a Tokio runtime.
    pub fn start(&self, address: String) -> Result<()> {
        let mut claimed = false;
        self.state.send_if_modified(|state| {
            if *state == ServerState::Stopped {
                *state = ServerState::Starting;
                claimed = true;
                true
            } else {
                false
            }
        });

        if !claimed {
            return Err(EngineError::ConfigError(format!(
                "Spoofing server already launched (state {:?})",
                self.state()
            )));
        }

        let service = Arc::clone(&self.service);
        let state = Arc::clone(&self.state);
        let fail_safe = Arc::clone(&self.fail_safe);

        let handle = tokio::spawn(async move {
            run_server(service, state, fail_safe, address).await;
        });
        *self.runner.lock() = Some(handle);

        Ok(())
    }

    /// Ask the server to stop
    pub async fn stop(&self) -> Result<()> {
        let message = self.service.stop().await;
        if message.is_empty() {
            Ok(())
        } else {
            Err(EngineError::ServiceStopFailed(message))
        }
    }

    /// Current state
    pub fn state(&self) -> ServerState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Resolve once the server has terminated, with the final state
    pub async fn wait_for_termination(&self) -> ServerState {
        let mut rx = self.subscribe();
        let result = rx.wait_for(ServerState::is_terminated).await.map(|s| s.clone());
        result.unwrap_or_else(|_| self.state())
    }

    /// Whether the background `start` task has finished
    pub fn is_finished(&self) -> bool {
        self.runner
            .lock()
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true)
    }
}

async fn run_server(
    service: Arc<dyn SpoofingService>,
    state: Arc<watch::Sender<ServerState>>,
    fail_safe: Arc<FailSafe>,
    address: String,
) {
    state.send_replace(ServerState::Running);
    info!("Starting spoofing server on {}", address);

    let message = service.start(&address).await;

    match Termination::classify(&message) {
        Termination::Graceful(message) => {
            info!("{}", message);
            metrics::counter!(SERVICE_TERMINATIONS, "kind" => "graceful").increment(1);
            state.send_replace(ServerState::StoppedGraceful(message));
        }
        Termination::Fatal(message) => {
            error!("{}", message);
            metrics::counter!(SERVICE_TERMINATIONS, "kind" => "fatal").increment(1);
            state.send_replace(ServerState::StoppedFatal(message.clone()));
            fail_safe.trip(&format!("spoofing server terminated: {}", message));
        }
    }
}
