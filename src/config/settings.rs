// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Arcana
//!
//! Handles loading and saving settings from ~/.arcana/settings.json

use serde::{Deserialize, Serialize};

use crate::error::{ArcanaError, Result};

mod io;

/// Key of the custom endpoint base URL
pub const KEY_BASE_URL: &str = "api_base_url";

/// Key of the custom endpoint API key
pub const KEY_API_KEY: &str = "api_key";

/// Key of the preferred model
pub const KEY_MODEL: &str = "api_model";

/// Keys readable and writable through a configuration store
pub const CONFIG_KEYS: &[&str] = &[KEY_BASE_URL, KEY_API_KEY, KEY_MODEL];

/// Main settings structure, stored in ~/.arcana/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Base URL of a custom OpenAI-compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    /// API key for the custom endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Last model used successfully (or chosen by the user)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_model: Option<String>,

    /// Seconds to wait for the response headers
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Interval between presentation redraws in the terminal
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_key: None,
            api_model: None,
            request_timeout_secs: default_request_timeout_secs(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl Settings {
    /// Read a configuration key
    pub fn value(&self, key: &str) -> Option<&str> {
        match key {
            KEY_BASE_URL => self.api_base_url.as_deref(),
            KEY_API_KEY => self.api_key.as_deref(),
            KEY_MODEL => self.api_model.as_deref(),
            _ => None,
        }
    }

    /// Write (or clear, with `None`) a configuration key
    pub fn set_value(&mut self, key: &str, value: Option<String>) -> Result<()> {
        let slot = match key {
            KEY_BASE_URL => &mut self.api_base_url,
            KEY_API_KEY => &mut self.api_key,
            KEY_MODEL => &mut self.api_model,
            other => {
                return Err(ArcanaError::Config(format!(
                    "unknown setting '{}' (expected one of: {})",
                    other,
                    CONFIG_KEYS.join(", ")
                )))
            }
        };
        *slot = value;
        Ok(())
    }

    /// Whether a full custom endpoint is configured
    pub fn has_custom_endpoint(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.api_base_url) && present(&self.api_key)
    }
}

/// Hide the middle of a secret for display
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_frame_interval_ms() -> u64 {
    16
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert!(settings.api_base_url.is_none());
        assert_eq!(settings.request_timeout_secs, 120);
        assert_eq!(settings.frame_interval_ms, 16);
        assert!(!settings.has_custom_endpoint());
    }

    #[test]
    fn test_settings_partial_json() {
        let settings: Settings = serde_json::from_str(r#"{"api_model":"m"}"#).unwrap();
        assert_eq!(settings.api_model.as_deref(), Some("m"));
        assert_eq!(settings.request_timeout_secs, 120);
    }

    #[test]
    fn test_value_and_set_value() {
        let mut settings = Settings::default();
        settings
            .set_value(KEY_BASE_URL, Some("https://api.example.com".to_string()))
            .unwrap();
        settings
            .set_value(KEY_API_KEY, Some("sk-123".to_string()))
            .unwrap();
        assert_eq!(settings.value(KEY_BASE_URL), Some("https://api.example.com"));
        assert!(settings.has_custom_endpoint());

        settings.set_value(KEY_API_KEY, None).unwrap();
        assert!(settings.value(KEY_API_KEY).is_none());
        assert!(!settings.has_custom_endpoint());
    }

    #[test]
    fn test_set_value_unknown_key() {
        let mut settings = Settings::default();
        let err = settings.set_value("theme", Some("dark".to_string())).unwrap_err();
        assert!(err.to_string().contains("unknown setting"));
    }

    #[test]
    fn test_has_custom_endpoint_ignores_blank_values() {
        let settings = Settings {
            api_base_url: Some("  ".to_string()),
            api_key: Some("sk".to_string()),
            ..Default::default()
        };
        assert!(!settings.has_custom_endpoint());
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(mask_secret("sk-abcdefghijkl"), "sk-...ijkl");
    }

    #[test]
    fn test_settings_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        let settings = Settings {
            api_base_url: Some("https://api.example.com/v1".to_string()),
            api_model: Some("model-Y".to_string()),
            ..Default::default()
        };
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_settings_load_from_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = Settings::load_from(&temp_dir.path().join("missing.json")).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"theme":"dark","api_model":"old"}"#).unwrap();

        let mut settings = Settings::load_from(&path).unwrap();
        settings.api_model = Some("new".to_string());
        settings.save_to(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["api_model"], "new");
    }

    #[test]
    fn test_save_removes_cleared_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"api_key":"sk-old","api_model":"m"}"#).unwrap();

        let mut settings = Settings::load_from(&path).unwrap();
        settings.api_key = None;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert!(loaded.api_key.is_none());
        assert_eq!(loaded.api_model.as_deref(), Some("m"));
    }
}
