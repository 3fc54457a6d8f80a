// packages/engine/src/observability/mod.rs
//! Logging and metrics
//!
//! Tracing goes to stderr through `tracing-subscriber`; metrics are optional
//! and exported in Prometheus format when an address is configured.

use crate::utils::config::ObservabilitySection;
use crate::utils::errors::{EngineError, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const REQUESTS_REWRITTEN: &str = "tlsmasq_requests_rewritten_total";
pub const REWRITE_FAILURES: &str = "tlsmasq_rewrite_failures_total";
pub const SERVICE_TERMINATIONS: &str = "tlsmasq_service_terminations_total";
pub const EXTENSION_DISABLED: &str = "tlsmasq_extension_disabled_total";

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &ObservabilitySection) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| EngineError::ConfigError(format!("Invalid log level: {}", e)))?;

    let installed = if config.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    };

    installed.map_err(|e| EngineError::ConfigError(format!("Failed to install tracing: {}", e)))
}

/// Install the Prometheus exporter if `metrics_addr` is set
pub fn init_metrics(config: &ObservabilitySection) -> Result<()> {
    let Some(addr) = &config.metrics_addr else {
        return Ok(());
    };

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| EngineError::ConfigError(format!("Invalid metrics address '{}': {}", addr, e)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| EngineError::ConfigError(format!("Failed to install metrics exporter: {}", e)))?;

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}
