// packages/engine/src/settings/mod.rs
//! Persisted extension settings
//!
//! Process-wide key/value settings read on every intercepted request:
//!
//! - **Store**: `get`/`set` backend contract, with an in-memory implementation
//! - **SQLite Store**: Durable backend that survives restarts
//! - **Extension Settings**: Typed accessors with first-access defaults
//! - **Fingerprints**: Catalogue of TLS fingerprint identities the spoofing server understands
//!
//! Values are never cached above the store, so a write is visible to the
//! very next request.

pub mod extension_settings;
pub mod fingerprints;
pub mod sqlite_store;
pub mod store;

pub use extension_settings::{ExtensionSettings, SettingKey};
pub use fingerprints::{is_known_fingerprint, FINGERPRINTS};
pub use sqlite_store::SqliteSettingsStore;
pub use store::{MemorySettingsStore, SettingsStore};
