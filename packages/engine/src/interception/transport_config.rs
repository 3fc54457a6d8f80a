// packages/engine/src/interception/transport_config.rs
//! Transport configuration handed to the spoofing server
//!
//! Built fresh for every request from the request's true destination and the
//! current settings. Serialised as a flat JSON object whose field names and
//! order are fixed: the spoofing server decodes it by name.

use crate::interception::message::HttpService;
use crate::settings::ExtensionSettings;
use crate::utils::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Per-request transport configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TransportConfig {
    /// Destination host of the original request
    pub host: String,

    /// Original scheme, `http` or `https`
    pub scheme: String,

    /// TLS fingerprint identity
    pub fingerprint: String,

    /// Raw ClientHello override, hex encoded; empty when unset
    pub hex_client_hello: String,

    /// Dial timeout, seconds
    pub http_timeout: i32,

    /// Keep-alive probe interval, seconds
    pub http_keep_alive_interval: i32,

    /// Idle connection lifetime, seconds
    pub idle_conn_timeout: i32,
}

impl TransportConfig {
    /// Build from the intercepted destination and the current settings
    pub fn build(service: &HttpService, settings: &ExtensionSettings) -> Result<Self> {
        Ok(Self {
            host: service.host.clone(),
            scheme: service.scheme.as_str().to_string(),
            fingerprint: settings.fingerprint()?,
            hex_client_hello: settings.hex_client_hello()?,
            http_timeout: settings.http_timeout()?,
            http_keep_alive_interval: settings.http_keep_alive_interval()?,
            idle_conn_timeout: settings.idle_conn_timeout()?,
        })
    }

    /// Compact JSON for the config header
    pub fn to_header_value(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a config header; missing fields take their zero value
    pub fn from_header_value(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(EngineError::ConfigError("missing transport configuration".into()));
        }
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::message::Scheme;
    use crate::settings::MemorySettingsStore;
    use std::sync::Arc;

    fn settings() -> ExtensionSettings {
        ExtensionSettings::new(Arc::new(MemorySettingsStore::new())).unwrap()
    }

    #[test]
    fn test_build_from_defaults() {
        let service = HttpService::new("example.com", 443, Scheme::Https);
        let config = TransportConfig::build(&service, &settings()).unwrap();

        assert_eq!(config.host, "example.com");
        assert_eq!(config.scheme, "https");
        assert_eq!(config.fingerprint, "Default");
        assert_eq!(config.hex_client_hello, "");
        assert_eq!(config.http_timeout, 30);
        assert_eq!(config.http_keep_alive_interval, 30);
        assert_eq!(config.idle_conn_timeout, 90);
    }

    #[test]
    fn test_canonical_serialisation() {
        let service = HttpService::new("example.com", 443, Scheme::Https);
        let settings = settings();
        settings.set_fingerprint("Chrome 120").unwrap();

        let json = TransportConfig::build(&service, &settings)
            .unwrap()
            .to_header_value()
            .unwrap();

        assert_eq!(
            json,
            r#"{"Host":"example.com","Scheme":"https","Fingerprint":"Chrome 120","HexClientHello":"","HttpTimeout":30,"HttpKeepAliveInterval":30,"IdleConnTimeout":90}"#
        );
    }

    #[test]
    fn test_reflects_latest_settings() {
        let service = HttpService::new("example.org", 80, Scheme::Http);
        let settings = settings();

        let before = TransportConfig::build(&service, &settings).unwrap();
        settings.set_idle_conn_timeout(5).unwrap();
        settings.set_hex_client_hello("16030100").unwrap();
        let after = TransportConfig::build(&service, &settings).unwrap();

        assert_eq!(before.idle_conn_timeout, 90);
        assert_eq!(after.idle_conn_timeout, 5);
        assert_eq!(after.hex_client_hello, "16030100");
        assert_eq!(after.scheme, "http");
    }

    #[test]
    fn test_parse_error_propagates() {
        let store = Arc::new(MemorySettingsStore::new());
        let settings = ExtensionSettings::new(store.clone()).unwrap();
        crate::settings::SettingsStore::set(store.as_ref(), "HttpTimeout", "thirty").unwrap();

        let service = HttpService::new("example.com", 443, Scheme::Https);
        let result = TransportConfig::build(&service, &settings);
        assert!(matches!(result, Err(EngineError::SettingParse { .. })));
    }

    #[test]
    fn test_decode_header() {
        let config = TransportConfig::from_header_value(
            r#"{"Host":"a.test","Scheme":"http","Fingerprint":"Opera 91"}"#,
        )
        .unwrap();
        assert_eq!(config.host, "a.test");
        assert_eq!(config.fingerprint, "Opera 91");
        assert_eq!(config.http_timeout, 0);
        assert_eq!(config.hex_client_hello, "");
    }

    #[test]
    fn test_decode_blank_header() {
        let result = TransportConfig::from_header_value("   ");
        assert!(matches!(result, Err(EngineError::ConfigError(msg)) if msg == "missing transport configuration"));
    }
}
