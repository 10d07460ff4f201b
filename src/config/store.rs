// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Key-value configuration stores
//!
//! The resolver reads the user's endpoint, key and model through
//! [`ConfigurationStore`] and writes the model back after a custom-mode run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::config::settings::Settings;
use crate::error::Result;

/// Persistent key-value settings
pub trait ConfigurationStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value
    fn remove(&self, key: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(target: "arcana.config", "configuration lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// In-memory store, useful for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with values
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: Mutex::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl ConfigurationStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.values).remove(key);
        Ok(())
    }
}

/// Store backed by the settings file
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    settings: Mutex<Settings>,
}

impl FileConfigStore {
    /// Open the store at the default settings path
    pub fn open() -> Result<Self> {
        Self::open_at(Settings::default_path())
    }

    /// Open the store at a specific path
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = Settings::load_from(&path)?;
        Ok(Self {
            path,
            settings: Mutex::new(settings),
        })
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> Settings {
        lock(&self.settings).clone()
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn write(&self, key: &str, value: Option<String>) -> Result<()> {
        let mut settings = lock(&self.settings);
        let mut staged = settings.clone();
        staged.set_value(key, value)?;
        staged.save_to(&self.path)?;
        *settings = staged;
        tracing::debug!(target: "arcana.config", key, path = %self.path.display(), "saved setting");
        Ok(())
    }
}

impl ConfigurationStore for FileConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.settings).value(key).map(str::to_string)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.write(key, Some(value.to_string()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.write(key, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{KEY_API_KEY, KEY_MODEL};
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryConfigStore::new();
        assert!(store.get(KEY_MODEL).is_none());
        store.set(KEY_MODEL, "m").unwrap();
        assert_eq!(store.get(KEY_MODEL).as_deref(), Some("m"));
        store.remove(KEY_MODEL).unwrap();
        assert!(store.get(KEY_MODEL).is_none());
    }

    #[test]
    fn test_memory_store_with_values() {
        let store = MemoryConfigStore::with_values([(KEY_API_KEY, "sk")]);
        assert_eq!(store.get(KEY_API_KEY).as_deref(), Some("sk"));
    }

    #[test]
    fn test_file_store_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("settings.json");

        let store = FileConfigStore::open_at(&path).unwrap();
        store.set(KEY_MODEL, "model-Y").unwrap();

        let reopened = FileConfigStore::open_at(&path).unwrap();
        assert_eq!(reopened.get(KEY_MODEL).as_deref(), Some("model-Y"));
        assert_eq!(reopened.settings().api_model.as_deref(), Some("model-Y"));
    }

    #[test]
    fn test_file_store_remove() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        let store = FileConfigStore::open_at(&path).unwrap();
        store.set(KEY_API_KEY, "sk").unwrap();
        store.remove(KEY_API_KEY).unwrap();

        let reopened = FileConfigStore::open_at(&path).unwrap();
        assert!(reopened.get(KEY_API_KEY).is_none());
    }

    #[test]
    fn test_failed_write_keeps_previous_value() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        let store = FileConfigStore::open_at(&path).unwrap();
        store.set(KEY_MODEL, "model-Y").unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.set(KEY_MODEL, "model-X").is_err());
        assert!(store.remove(KEY_MODEL).is_err());
        assert_eq!(store.get(KEY_MODEL).as_deref(), Some("model-Y"));
    }

    #[test]
    fn test_file_store_rejects_unknown_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileConfigStore::open_at(temp_dir.path().join("settings.json")).unwrap();
        assert!(store.set("colour", "red").is_err());
    }
}
