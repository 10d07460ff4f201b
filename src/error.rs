// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Arcana
//!
//! Every failure a reading run can hit is one variant of [`ArcanaError`].
//! Malformed stream frames never reach this type (the parser drops them), and
//! an empty answer is an outcome of the session rather than an error.

use thiserror::Error;

/// Main error type for Arcana operations
#[derive(Error, Debug)]
pub enum ArcanaError {
    /// Neither a custom endpoint nor the default relay can be used
    #[error("API configuration missing: set a base URL and API key with `arcana config set`, or enable the default relay")]
    ConfigurationMissing,

    /// The endpoint answered with a non-success HTTP status
    #[error(
        "API request failed: {status} {status_text}{}",
        .detail.as_ref().map(|d| format!(" ({d})")).unwrap_or_default()
    )]
    Transport {
        status: u16,
        status_text: String,
        detail: Option<String>,
    },

    /// The response carried no readable body stream
    #[error("Unable to read response stream")]
    StreamUnavailable,

    /// A frame inside the stream carried an `error` field
    #[error("{0}")]
    InStream(String),

    /// Reading the body failed part-way through
    #[error("Streaming error: {0}")]
    Stream(String),

    /// The stream finished without any usable text
    #[error("The model returned no content")]
    EmptyResponse,

    /// No response headers arrived within the request timeout
    #[error("Request timed out, please retry later")]
    Timeout,

    /// The run was cancelled by its caller
    #[error("cancelled")]
    Cancelled,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ArcanaError {
    /// Whether pointing the user at the configuration surface can fix this error
    pub fn is_configuration_related(&self) -> bool {
        match self {
            ArcanaError::ConfigurationMissing | ArcanaError::Config(_) => true,
            ArcanaError::Transport { status, .. } => matches!(status, 401 | 403 | 404),
            _ => false,
        }
    }
}

/// Result type alias for Arcana operations
pub type Result<T> = std::result::Result<T, ArcanaError>;
