// packages/engine/src/lib.rs
//! tlsmasq engine library
//!
//! Routes intercepted HTTP(S) requests through a TLS fingerprint spoofing
//! server. Each request is retargeted to the local control-plane address and
//! carries its true destination plus the chosen fingerprint in a JSON header;
//! the spoofing server dials the real host with that handshake.
//!
//! # Architecture
//!
//! - **settings**: Persisted key/value settings with typed accessors and defaults
//! - **interception**: Transport config, request rewriting, proxy harness
//! - **runtime**: Spoofing server contract and lifecycle supervision
//! - **extension**: Host-facing hooks and the fail-safe
//! - **observability**: Tracing and metrics setup
//! - **utils**: Configuration and errors

pub mod extension;
pub mod interception;
pub mod observability;
pub mod runtime;
pub mod settings;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use extension::{Extension, ExtensionHooks, FailSafe, HostControl, UnloadSignal};
pub use interception::{OutboundRequest, RequestRewriter, TransportConfig};
pub use runtime::{ProcessService, ServerState, ServerSupervisor, SpoofingService};
pub use settings::{ExtensionSettings, SettingsStore};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Engine build information
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            git_hash: GIT_HASH,
            build_timestamp: env!("BUILD_TIMESTAMP"),
            rustc_version: env!("RUSTC_VERSION"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_build_info() {
        let info = BuildInfo::current();
        assert!(!info.version.is_empty());
        assert!(!info.git_hash.is_empty());
    }
}
