// packages/engine/src/main.rs
//! tlsmasq
//!
//! Runs the interception harness in front of a supervised TLS fingerprint
//! spoofing server. Requests sent through the harness are rewritten toward
//! the spoofing server's control-plane address.

use anyhow::Result;
use std::sync::Arc;
use tlsmasq_engine::extension::{Extension, ExtensionHooks, UnloadSignal};
use tlsmasq_engine::interception::{HarnessConfig, ProxyHarness};
use tlsmasq_engine::observability::{init_metrics, init_tracing};
use tlsmasq_engine::runtime::{ProcessService, ServiceCommand};
use tlsmasq_engine::settings::{ExtensionSettings, SqliteSettingsStore};
use tlsmasq_engine::utils::config::EngineConfig;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = EngineConfig::load()?;

    // Initialize observability (tracing, metrics)
    init_tracing(&config.observability)?;
    init_metrics(&config.observability)?;

    info!(
        "Starting tlsmasq v{} ({})",
        tlsmasq_engine::VERSION,
        tlsmasq_engine::GIT_HASH
    );
    info!("Configuration loaded: {:?}", config);

    // Extension settings survive restarts
    let store = Arc::new(SqliteSettingsStore::open(&config.settings.db_path)?);
    let settings = ExtensionSettings::new(store)?;

    // Load the extension; this launches the spoofing server
    let service = Arc::new(ProcessService::new(ServiceCommand::from(&config.service)));
    let host = Arc::new(UnloadSignal::new());
    let extension = Arc::new(
        Extension::load(settings, service, host.clone())?
            .with_shutdown_grace(config.service.stop_grace()),
    );

    let harness_config = HarnessConfig::try_from(&config.harness)?;
    let harness = Arc::new(ProxyHarness::new(harness_config, extension.clone())?);

    // Run until interrupted or until the extension disables itself
    tokio::select! {
        result = harness.start() => {
            if let Err(e) = result {
                error!("Proxy harness error: {}", e);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received shutdown signal, cleaning up..."),
                Err(e) => error!("Failed to listen for CTRL+C: {}", e),
            }
        }
        reason = host.unloaded() => {
            warn!("Extension unloaded: {}", reason);
        }
    }

    extension.on_shutdown().await;

    if extension.is_disabled() {
        anyhow::bail!("extension disabled itself");
    }

    info!("Shutdown complete.");
    Ok(())
}
