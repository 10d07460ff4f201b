// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Environment-provided default configuration
//!
//! Deployments can enable a first-party relay so readings work without the
//! user supplying their own endpoint and key.

/// Enables the default relay (`true`, `1`, `yes` or `on`)
pub const ENV_DEFAULT_ENABLED: &str = "ARCANA_DEFAULT_LLM_ENABLED";

/// URL the relay accepts completion requests on
pub const ENV_RELAY_URL: &str = "ARCANA_RELAY_URL";

/// Model requested through the relay
pub const ENV_DEFAULT_MODEL: &str = "ARCANA_DEFAULT_MODEL";

/// Default configuration supplied by the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultLlmConfig {
    pub enabled: bool,
    pub relay_url: Option<String>,
    pub model: Option<String>,
}

impl DefaultLlmConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            enabled: parse_bool(lookup(ENV_DEFAULT_ENABLED).as_deref()),
            relay_url: normalize(lookup(ENV_RELAY_URL)),
            model: normalize(lookup(ENV_DEFAULT_MODEL)),
        }
    }

    /// An enabled relay at `relay_url`
    pub fn relay(relay_url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            relay_url: normalize(Some(relay_url.into())),
            model: None,
        }
    }

    /// Set the default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = normalize(Some(model.into()));
        self
    }

    /// The relay can be used: enabled and has somewhere to send requests
    pub fn is_usable(&self) -> bool {
        self.enabled && self.relay_url.is_some()
    }
}

/// Trim a value, treating blank as absent
pub(crate) fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes" | "on")
    )
}
