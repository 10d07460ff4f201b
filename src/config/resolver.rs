// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Effective endpoint, key and model selection
//!
//! Competing sources, highest priority first:
//! - an explicit override model for this run
//! - the user's own endpoint, key and model (custom mode)
//! - the environment default relay (proxied mode)
//! - [`FALLBACK_MODEL`]

use crate::config::defaults::{normalize, DefaultLlmConfig};
use crate::config::settings::{KEY_API_KEY, KEY_BASE_URL, KEY_MODEL};
use crate::config::store::ConfigurationStore;
use crate::error::{ArcanaError, Result};
use crate::llm::transport::RouteDecision;

/// Model used when no source names one
pub const FALLBACK_MODEL: &str = "Qwen/Qwen3-Next-80B-A3B-Instruct";

/// The user's stored endpoint configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiConfiguration {
    pub endpoint: Option<String>,
    pub key: Option<String>,
    pub model: Option<String>,
}

impl ApiConfiguration {
    /// Read from a store; values are trimmed and blanks dropped
    pub fn load(store: &dyn ConfigurationStore) -> Self {
        Self {
            endpoint: normalize(store.get(KEY_BASE_URL)),
            key: normalize(store.get(KEY_API_KEY)),
            model: normalize(store.get(KEY_MODEL)),
        }
    }

    /// Endpoint and key are both present
    pub fn is_custom(&self) -> bool {
        self.endpoint.is_some() && self.key.is_some()
    }
}

/// Outcome of resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub model: String,
    pub route: RouteDecision,
}

/// Pick the effective model and route for one run.
///
/// In custom mode the chosen model is written back to `store`; a failed
/// write is logged and otherwise ignored.
pub fn resolve(
    override_model: Option<&str>,
    store: &dyn ConfigurationStore,
    defaults: &DefaultLlmConfig,
) -> Result<ResolvedConfig> {
    let user = ApiConfiguration::load(store);
    let resolved = resolve_with(override_model, &user, defaults)?;

    if resolved.route.is_custom() {
        if let Err(error) = store.set(KEY_MODEL, &resolved.model) {
            tracing::warn!(
                target: "arcana.config",
                %error,
                "failed to remember the selected model"
            );
        }
    }

    Ok(resolved)
}

/// Pure resolution over already-loaded inputs
pub fn resolve_with(
    override_model: Option<&str>,
    user: &ApiConfiguration,
    defaults: &DefaultLlmConfig,
) -> Result<ResolvedConfig> {
    let route = match (&user.endpoint, &user.key) {
        (Some(endpoint), Some(key)) => RouteDecision::Custom {
            endpoint: endpoint.clone(),
            key: key.clone(),
        },
        _ => match (&defaults.relay_url, defaults.is_usable()) {
            (Some(relay_url), true) => RouteDecision::Proxied {
                relay_url: relay_url.clone(),
            },
            _ => return Err(ArcanaError::ConfigurationMissing),
        },
    };

    let override_model = override_model.map(str::trim).filter(|m| !m.is_empty());
    let user_model = if route.is_custom() {
        user.model.as_deref()
    } else {
        None
    };
    let default_model = if route.is_custom() {
        None
    } else {
        defaults.model.as_deref()
    };

    let model = override_model
        .or(user_model)
        .or(default_model)
        .unwrap_or(FALLBACK_MODEL)
        .to_string();

    tracing::debug!(
        target: "arcana.config",
        mode = route.mode(),
        %model,
        "resolved configuration"
    );

    Ok(ResolvedConfig { model, route })
}
