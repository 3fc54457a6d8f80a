// packages/engine/src/utils/config.rs
//! Process configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `tlsmasq.{toml,yaml,json}` file, then `TLSMASQ__SECTION__KEY` environment
//! variables. The per-request extension settings (fingerprint, timeouts,
//! control-plane address) are not part of this; they live in the settings store.

use crate::utils::errors::{EngineError, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for the `tlsmasq` binary
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub harness: HarnessSection,
    pub settings: SettingsSection,
    pub service: ServiceSection,
    pub observability: ObservabilitySection,
}

/// Proxy harness listener
#[derive(Debug, Clone, Deserialize)]
pub struct HarnessSection {
    /// Address the harness accepts proxy traffic on
    pub listen_addr: String,

    /// Log every request passing through the harness
    pub log_requests: bool,

    /// Log status and size of every control-plane response
    pub log_responses: bool,
}

/// Extension settings persistence
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsSection {
    /// SQLite file holding the extension settings
    pub db_path: PathBuf,
}

/// Spoofing server executable
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    /// Program name (looked up in PATH) or path
    pub program: String,

    /// Arguments; `{address}` is replaced by the control-plane address
    pub args: Vec<String>,

    /// Seconds between SIGTERM and SIGKILL on stop
    pub stop_grace_secs: u64,
}

impl ServiceSection {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

/// Logging and metrics
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilitySection {
    /// Default filter directive when `RUST_LOG` is unset
    pub log_level: String,

    /// `pretty` or `json`
    pub log_format: String,

    /// Prometheus exporter listen address, disabled when absent
    pub metrics_addr: Option<String>,
}

impl EngineConfig {
    /// Load from `./tlsmasq.*` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load using an explicit configuration file instead of `./tlsmasq.*`
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("tlsmasq").required(false),
        };

        let config = Config::builder()
            .set_default("harness.listen_addr", "127.0.0.1:8080")?
            .set_default("harness.log_requests", true)?
            .set_default("harness.log_responses", false)?
            .set_default("settings.db_path", "tlsmasq-settings.db")?
            .set_default("service.program", "tlsmasq-spoof-server")?
            .set_default(
                "service.args",
                vec!["--addr".to_string(), "{address}".to_string()],
            )?
            .set_default("service.stop_grace_secs", 5)?
            .set_default("observability.log_level", "info")?
            .set_default("observability.log_format", "pretty")?
            .add_source(file)
            .add_source(Environment::with_prefix("TLSMASQ").separator("__"))
            .build()?;

        let config: EngineConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.service.program.trim().is_empty() {
            return Err(EngineError::ConfigError(
                "service.program must not be empty".into(),
            ));
        }

        match self.observability.log_format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(EngineError::ConfigError(format!(
                "Unknown log format '{}' (expected 'pretty' or 'json')",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "# empty").unwrap();

        let config = EngineConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.harness.listen_addr, "127.0.0.1:8080");
        assert!(config.harness.log_requests);
        assert!(!config.harness.log_responses);
        assert_eq!(config.service.args, vec!["--addr", "{address}"]);
        assert_eq!(config.service.stop_grace(), Duration::from_secs(5));
        assert_eq!(config.observability.log_format, "pretty");
        assert!(config.observability.metrics_addr.is_none());
    }

    #[test]
    fn test_file_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[harness]
log_responses = true

[service]
program = "/opt/spoof/server"
args = ["serve", "-l", "{{address}}"]

[observability]
log_format = "json"
metrics_addr = "127.0.0.1:9100"
"#
        )
        .unwrap();

        let config = EngineConfig::load_from(Some(file.path())).unwrap();
        assert!(config.harness.log_responses);
        assert_eq!(config.service.program, "/opt/spoof/server");
        assert_eq!(config.service.args, vec!["serve", "-l", "{address}"]);
        assert_eq!(config.observability.log_format, "json");
        assert_eq!(
            config.observability.metrics_addr.as_deref(),
            Some("127.0.0.1:9100")
        );
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[observability]\nlog_format = \"xml\"").unwrap();

        let result = EngineConfig::load_from(Some(file.path()));
        assert!(matches!(result, Err(EngineError::ConfigError(_))));
    }
}
