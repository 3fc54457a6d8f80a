// packages/engine/src/runtime/spoofing_service.rs
//! Control surface of the TLS spoofing server
//!
//! The spoofing server is an external program. The supervisor only needs two
//! calls: `start`, which resolves once the server has terminated and reports
//! why, and `stop`, which asks a running server to shut down and returns
//! promptly. [`ProcessService`] implements them for a managed subprocess:
//!
//! - `start` spawns the executable and waits on it
//! - `stop` sends SIGTERM, escalating to SIGKILL after a grace period
//! - stderr lines are forwarded to tracing; the last one explains a crash

use crate::utils::config::ServiceSection;
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info, warn};

/// Substring of a `start` result that marks a requested shutdown
pub const GRACEFUL_STOP_SIGNATURE: &str = "Server stopped";

/// Placeholder in [`ServiceCommand::args`] replaced by the listen address
pub const ADDRESS_PLACEHOLDER: &str = "{address}";

/// Start/stop contract of the spoofing server
#[async_trait]
pub trait SpoofingService: Send + Sync {
    /// Run the server on `address`. Resolves only when it has terminated;
    /// the message says why.
    async fn start(&self, address: &str) -> String;

    /// Ask the server to stop. Empty on success, otherwise an error message.
    async fn stop(&self) -> String;
}

/// How to launch the spoofing server executable
#[derive(Debug, Clone)]
pub struct ServiceCommand {
    /// Program name (resolved through PATH) or path
    pub program: String,

    /// Arguments, `{address}` substituted
    pub args: Vec<String>,

    /// Extra environment variables
    pub env_vars: Vec<(String, String)>,

    /// Working directory
    pub work_dir: Option<String>,

    /// Time between SIGTERM and SIGKILL
    pub stop_grace: Duration,
}

impl Default for ServiceCommand {
    fn default() -> Self {
        Self {
            program: "tlsmasq-spoof-server".to_string(),
            args: vec!["--addr".to_string(), ADDRESS_PLACEHOLDER.to_string()],
            env_vars: vec![],
            work_dir: None,
            stop_grace: Duration::from_secs(5),
        }
    }
}

impl From<&ServiceSection> for ServiceCommand {
    fn from(section: &ServiceSection) -> Self {
        Self {
            program: section.program.clone(),
            args: section.args.clone(),
            stop_grace: section.stop_grace(),
            ..Default::default()
        }
    }
}

impl ServiceCommand {
    fn resolved_args(&self, address: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(ADDRESS_PLACEHOLDER, address))
            .collect()
    }
}

/// Spoofing server run as a child process
pub struct ProcessService {
    command: ServiceCommand,
    pid: Arc<Mutex<Option<u32>>>,
    stop_requested: AtomicBool,
}

impl ProcessService {
    pub fn new(command: ServiceCommand) -> Self {
        Self {
            command,
            pid: Arc::new(Mutex::new(None)),
            stop_requested: AtomicBool::new(false),
        }
    }

    /// PID of the running server, if any
    pub fn pid(&self) -> Option<u32> {
        *self.pid.lock()
    }

    fn find_executable(&self) -> Result<PathBuf> {
        which::which(&self.command.program).map_err(|e| {
            EngineError::ProcessSpawnFailed(format!(
                "Executable '{}' not found: {}",
                self.command.program, e
            ))
        })
    }

    fn spawn(&self, address: &str) -> Result<Child> {
        let executable = self.find_executable()?;
        debug!("Spawning spoofing server: {:?}", executable);

        let mut command = Command::new(executable);
        command.args(self.command.resolved_args(address));

        if let Some(work_dir) = &self.command.work_dir {
            command.current_dir(work_dir);
        }

        for (key, value) in &self.command.env_vars {
            command.env(key, value);
        }

        command
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        command
            .spawn()
            .map_err(|e| EngineError::ProcessSpawnFailed(format!("Failed to spawn process: {}", e)))
    }
}

/// Forward server stderr to tracing, returning the last non-blank line
async fn forward_stderr(stderr: ChildStderr) -> Option<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut last = None;

    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "tlsmasq::spoof_server", "{}", line);
        if !line.trim().is_empty() {
            last = Some(line);
        }
    }

    last
}

/// Lowercase any copy of the graceful signature in server-provided text
///
/// Only a requested stop may report the signature.
fn without_stop_signature(text: &str) -> String {
    text.replace(GRACEFUL_STOP_SIGNATURE, &GRACEFUL_STOP_SIGNATURE.to_lowercase())
}

#[async_trait]
impl SpoofingService for ProcessService {
    async fn start(&self, address: &str) -> String {
        // The pid lock orders launch against `stop`: either stop sees the
        // pid, or start sees the stop flag and never spawns
        let mut child = {
            let mut pid = self.pid.lock();
            if self.stop_requested.load(Ordering::SeqCst) {
                return format!("{} before launch", GRACEFUL_STOP_SIGNATURE);
            }

            let child = match self.spawn(address) {
                Ok(child) => child,
                Err(e) => return without_stop_signature(&e.to_string()),
            };
            *pid = child.id();
            child
        };
        info!(pid = ?child.id(), "Spoofing server listening on {}", address);

        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(forward_stderr(stderr)));
        let status = child.wait().await;
        *self.pid.lock() = None;

        let last_line = match stderr_task {
            Some(task) => task.await.ok().flatten(),
            None => None,
        };

        let status = match status {
            Ok(status) => status.to_string(),
            Err(e) => format!("wait failed: {}", e),
        };

        if self.stop_requested.load(Ordering::SeqCst) {
            return format!("{} ({})", GRACEFUL_STOP_SIGNATURE, status);
        }

        match last_line {
            Some(line) => format!(
                "spoofing server exited unexpectedly ({}): {}",
                status,
                without_stop_signature(&line)
            ),
            None => format!("spoofing server exited unexpectedly ({})", status),
        }
    }

    async fn stop(&self) -> String {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let running = {
            let pid = self.pid.lock();
            self.stop_requested.store(true, Ordering::SeqCst);
            *pid
        };

        let Some(raw_pid) = running else {
            debug!("Stop requested with no spoofing server running");
            return String::new();
        };
        let pid = Pid::from_raw(raw_pid as i32);

        debug!("Sending SIGTERM to PID {}", pid);
        if let Err(e) = kill(pid, Signal::SIGTERM) {
            return format!("Failed to send SIGTERM to PID {}: {}", pid, e);
        }

        // Escalate in the background so unload is not held up
        let grace = self.command.stop_grace;
        let current = Arc::clone(&self.pid);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if *current.lock() == Some(raw_pid) {
                warn!("Spoofing server still alive after {:?}, sending SIGKILL to PID {}", grace, pid);
                if let Err(e) = kill(pid, Signal::SIGKILL) {
                    warn!("Failed to send SIGKILL: {}", e);
                }
            }
        });

        String::new()
    }
}
