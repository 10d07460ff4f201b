// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::{Settings, CONFIG_KEYS};

impl Settings {
    /// Get the default settings file path.
    pub fn default_path() -> PathBuf {
        Self::arcana_home().join("settings.json")
    }

    /// Get the default reading history path.
    pub fn history_path() -> PathBuf {
        Self::arcana_home().join("history.json")
    }

    /// Get the arcana home directory (~/.arcana or $ARCANA_HOME).
    pub fn arcana_home() -> PathBuf {
        if let Ok(home) = std::env::var("ARCANA_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".arcana")
    }

    /// Load settings from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a specific path, merging with existing file content
    /// to preserve unknown keys from other versions or hand edits.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let new_value = serde_json::to_value(self)?;

        let mut merged = if path.exists() {
            let existing_content = std::fs::read_to_string(path)?;
            match serde_json::from_str::<Value>(&existing_content) {
                Ok(existing_value) => deep_merge(existing_value, new_value),
                Err(_) => new_value, // Corrupt file, overwrite entirely.
            }
        } else {
            new_value
        };

        // Cleared keys are skipped on serialization, so the merge would
        // otherwise resurrect them from the old file.
        if let Value::Object(map) = &mut merged {
            for key in CONFIG_KEYS {
                if self.value(key).is_none() {
                    map.remove(*key);
                }
            }
        }

        let content = serde_json::to_string_pretty(&merged)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Recursively overlay `overlay` onto `base`; objects merge, anything else replaces.
fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = if let Some(base_val) = base_map.remove(&key) {
                    deep_merge(base_val, overlay_val)
                } else {
                    overlay_val
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_base, overlay) => overlay,
    }
}
