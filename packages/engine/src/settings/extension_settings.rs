// packages/engine/src/settings/extension_settings.rs
//! Typed access to the extension settings
//!
//! Every key has a documented default. Defaults are written to the store on
//! construction and again on any read that finds the key missing, so an
//! accessor never observes an absent value.

use crate::settings::fingerprints::{is_known_fingerprint, DEFAULT_FINGERPRINT, FINGERPRINTS};
use crate::settings::store::SettingsStore;
use crate::utils::errors::{EngineError, Result};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8887";
pub const DEFAULT_HTTP_TIMEOUT: i32 = 30;
pub const DEFAULT_HTTP_KEEP_ALIVE_INTERVAL: i32 = 30;
pub const DEFAULT_IDLE_CONN_TIMEOUT: i32 = 90;

/// Recognised setting keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Address,
    Fingerprint,
    HexClientHello,
    HttpTimeout,
    HttpKeepAliveInterval,
    IdleConnTimeout,
}

impl SettingKey {
    pub const ALL: [SettingKey; 6] = [
        SettingKey::Address,
        SettingKey::Fingerprint,
        SettingKey::HexClientHello,
        SettingKey::HttpTimeout,
        SettingKey::HttpKeepAliveInterval,
        SettingKey::IdleConnTimeout,
    ];

    /// Key name in the store
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::Address => "Address",
            SettingKey::Fingerprint => "Fingerprint",
            SettingKey::HexClientHello => "HexClientHello",
            SettingKey::HttpTimeout => "HttpTimeout",
            SettingKey::HttpKeepAliveInterval => "HttpKeepAliveInterval",
            SettingKey::IdleConnTimeout => "IdleConnTimeout",
        }
    }

    /// Value written when the key is absent
    pub fn default_value(&self) -> String {
        match self {
            SettingKey::Address => DEFAULT_ADDRESS.to_string(),
            SettingKey::Fingerprint => DEFAULT_FINGERPRINT.to_string(),
            SettingKey::HexClientHello => String::new(),
            SettingKey::HttpTimeout => DEFAULT_HTTP_TIMEOUT.to_string(),
            SettingKey::HttpKeepAliveInterval => DEFAULT_HTTP_KEEP_ALIVE_INTERVAL.to_string(),
            SettingKey::IdleConnTimeout => DEFAULT_IDLE_CONN_TIMEOUT.to_string(),
        }
    }
}

/// Extension settings over an injected store
#[derive(Clone)]
pub struct ExtensionSettings {
    store: Arc<dyn SettingsStore>,
}

impl ExtensionSettings {
    /// Wrap `store` and write defaults for any missing key
    pub fn new(store: Arc<dyn SettingsStore>) -> Result<Self> {
        let settings = Self { store };
        settings.ensure_defaults()?;
        Ok(settings)
    }

    /// Write the default for every key the store does not hold yet
    pub fn ensure_defaults(&self) -> Result<()> {
        for key in SettingKey::ALL {
            if self.store.get(key.as_str())?.is_none() {
                let value = key.default_value();
                self.store.set(key.as_str(), &value)?;
                info!("Initialised setting {} = {:?}", key.as_str(), value);
            }
        }
        Ok(())
    }

    /// Raw read; writes and returns the default if the key is missing
    pub fn read(&self, key: SettingKey) -> Result<String> {
        match self.store.get(key.as_str())? {
            Some(value) => Ok(value),
            None => {
                let value = key.default_value();
                self.store.set(key.as_str(), &value)?;
                Ok(value)
            }
        }
    }

    /// Raw write
    pub fn write(&self, key: SettingKey, value: &str) -> Result<()> {
        self.store.set(key.as_str(), value)
    }

    fn read_int(&self, key: SettingKey) -> Result<i32> {
        let value = self.read(key)?;
        value.parse::<i32>().map_err(|source| EngineError::SettingParse {
            key: key.as_str(),
            value,
            source,
        })
    }

    /// Control-plane address as stored (`host:port`)
    pub fn address(&self) -> Result<String> {
        self.read(SettingKey::Address)
    }

    pub fn set_address(&self, address: &str) -> Result<()> {
        self.write(SettingKey::Address, address)
    }

    pub fn fingerprint(&self) -> Result<String> {
        self.read(SettingKey::Fingerprint)
    }

    /// Store a fingerprint identity; unknown names are kept but flagged
    pub fn set_fingerprint(&self, fingerprint: &str) -> Result<()> {
        if !is_known_fingerprint(fingerprint) {
            warn!("Fingerprint {:?} is not in the catalogue", fingerprint);
        }
        self.write(SettingKey::Fingerprint, fingerprint)
    }

    /// Hex-encoded ClientHello override, empty when unset
    pub fn hex_client_hello(&self) -> Result<String> {
        self.read(SettingKey::HexClientHello)
    }

    pub fn set_hex_client_hello(&self, hex_client_hello: &str) -> Result<()> {
        self.write(SettingKey::HexClientHello, hex_client_hello)
    }

    /// Dial timeout in seconds
    pub fn http_timeout(&self) -> Result<i32> {
        self.read_int(SettingKey::HttpTimeout)
    }

    pub fn set_http_timeout(&self, seconds: i32) -> Result<()> {
        self.write(SettingKey::HttpTimeout, &seconds.to_string())
    }

    /// Keep-alive probe interval in seconds
    pub fn http_keep_alive_interval(&self) -> Result<i32> {
        self.read_int(SettingKey::HttpKeepAliveInterval)
    }

    pub fn set_http_keep_alive_interval(&self, seconds: i32) -> Result<()> {
        self.write(SettingKey::HttpKeepAliveInterval, &seconds.to_string())
    }

    /// Idle connection lifetime in seconds
    pub fn idle_conn_timeout(&self) -> Result<i32> {
        self.read_int(SettingKey::IdleConnTimeout)
    }

    pub fn set_idle_conn_timeout(&self, seconds: i32) -> Result<()> {
        self.write(SettingKey::IdleConnTimeout, &seconds.to_string())
    }

    /// Selectable fingerprint identities
    pub fn fingerprints(&self) -> &'static [&'static str] {
        FINGERPRINTS
    }
}
