// packages/engine/src/settings/store.rs
//! Settings backend contract

use crate::utils::errors::Result;
use dashmap::DashMap;

/// Raw string key/value storage
///
/// Implementations must make a `set` visible to every later `get`, from any
/// thread, without the caller synchronising.
pub trait SettingsStore: Send + Sync {
    /// Read a value, `None` when the key was never written
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store for tests and embedders that persist elsewhere
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: DashMap<String, String>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_key() {
        let store = MemorySettingsStore::new();
        assert_eq!(store.get("Address").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_overwrites() {
        let store = MemorySettingsStore::new();
        store.set("Fingerprint", "Chrome 120").unwrap();
        store.set("Fingerprint", "Firefox 117").unwrap();

        assert_eq!(store.get("Fingerprint").unwrap().as_deref(), Some("Firefox 117"));
        assert_eq!(store.len(), 1);
    }
}
