// packages/engine/src/utils/errors.rs
//! Engine error type

use std::num::ParseIntError;
use thiserror::Error;

/// Errors raised by the interception and supervision layers
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid process configuration or illegal lifecycle transition
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A persisted numeric setting does not parse as an integer
    #[error("Setting '{key}' holds non-numeric value {value:?}: {source}")]
    SettingParse {
        key: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// The settings backend could not be read or written
    #[error("Settings storage failed: {0}")]
    StorageFailed(String),

    /// The control-plane address could not be applied to a request
    #[error("Failed to intercept http service: {0}")]
    RewriteFailed(String),

    /// The fail-safe has tripped and the extension no longer rewrites traffic
    #[error("Extension disabled: {0}")]
    ExtensionDisabled(String),

    /// The spoofing server process could not be launched
    #[error("Failed to spawn spoofing server: {0}")]
    ProcessSpawnFailed(String),

    /// The explicit stop call reported an error
    #[error("Failed to stop spoofing server: {0}")]
    ServiceStopFailed(String),

    /// Harness-level I/O failure (bind, body read, upstream call)
    #[error("Interception failed: {0}")]
    InterceptionFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),
}

impl EngineError {
    /// Whether this error must disable the extension
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::RewriteFailed(_))
    }
}

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_parse_message() {
        let source = "abc".parse::<u32>().unwrap_err();
        let err = EngineError::SettingParse {
            key: "HttpTimeout",
            value: "abc".to_string(),
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("HttpTimeout"));
        assert!(msg.contains("\"abc\""));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_rewrite_failure_is_fatal() {
        assert!(EngineError::RewriteFailed("bad address".into()).is_fatal());
        assert!(!EngineError::ServiceStopFailed("boom".into()).is_fatal());
    }
}
