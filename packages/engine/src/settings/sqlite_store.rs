// packages/engine/src/settings/sqlite_store.rs
//! Settings persisted in SQLite
//!
//! One row per key. Every `get` goes to the database so writes made by
//! another handle on the same file are picked up on the next read.

use crate::settings::store::SettingsStore;
use crate::utils::errors::{EngineError, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// SQLite-backed settings store
pub struct SqliteSettingsStore {
    path: PathBuf,
    db: Mutex<Connection>,
}

impl SqliteSettingsStore {
    /// Open (creating if needed) the settings database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::StorageFailed(format!("Failed to create directory: {}", e))
            })?;
        }

        let conn = Connection::open(&path).map_err(|e| {
            EngineError::StorageFailed(format!("Failed to open database: {}", e))
        })?;

        let store = Self {
            path,
            db: Mutex::new(conn),
        };
        store.init_schema()?;

        info!("Settings store opened at {:?}", store.path);
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let db = self.db.lock();

        db.execute(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| EngineError::StorageFailed(format!("Schema creation failed: {}", e)))?;

        Ok(())
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock();

        db.query_row(
            "SELECT value FROM settings WHERE key = ?",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| EngineError::StorageFailed(format!("Failed to read '{}': {}", key, e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock();

        db.execute(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, chrono::Utc::now().timestamp()],
        )
        .map_err(|e| EngineError::StorageFailed(format!("Failed to write '{}': {}", key, e)))?;

        debug!("Stored setting {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_creation() {
        let dir = tempdir().unwrap();
        let store = SqliteSettingsStore::open(dir.path().join("nested/settings.db"));
        assert!(store.is_ok());
    }

    #[test]
    fn test_get_set() {
        let dir = tempdir().unwrap();
        let store = SqliteSettingsStore::open(dir.path().join("settings.db")).unwrap();

        assert_eq!(store.get("Address").unwrap(), None);

        store.set("Address", "127.0.0.1:9999").unwrap();
        store.set("Address", "10.0.0.2:8887").unwrap();
        assert_eq!(store.get("Address").unwrap().as_deref(), Some("10.0.0.2:8887"));
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.db");

        {
            let store = SqliteSettingsStore::open(&path).unwrap();
            store.set("Fingerprint", "Safari 16.0").unwrap();
        }

        let store = SqliteSettingsStore::open(&path).unwrap();
        assert_eq!(store.get("Fingerprint").unwrap().as_deref(), Some("Safari 16.0"));
    }

    #[test]
    fn test_writes_visible_across_handles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.db");

        let reader = SqliteSettingsStore::open(&path).unwrap();
        let writer = SqliteSettingsStore::open(&path).unwrap();

        writer.set("HttpTimeout", "45").unwrap();
        assert_eq!(reader.get("HttpTimeout").unwrap().as_deref(), Some("45"));
    }
}
