// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming transport for chat completions
//!
//! Sends one OpenAI-compatible `POST` with `stream: true` and hands back the
//! raw response body as a byte stream. Requests go either straight to the
//! user's own endpoint (custom mode, with their key) or to the first-party
//! relay, which injects its own credentials.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

use crate::error::{ArcanaError, Result};
use crate::llm::message::ChatMessage;

/// Default time allowed for the response headers to arrive
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Most messages the relay accepts in one request
pub const MAX_RELAY_MESSAGES: usize = 50;

/// Longest message body (in characters) the relay accepts
pub const MAX_RELAY_CONTENT_CHARS: usize = 10_000;

/// Raw response body chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Where a completion request is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Directly to the user's endpoint with their key
    Custom { endpoint: String, key: String },
    /// Through the first-party relay, which holds its own credentials
    Proxied { relay_url: String },
}

impl RouteDecision {
    /// Full URL the request is posted to
    pub fn url(&self) -> String {
        match self {
            RouteDecision::Custom { endpoint, .. } => {
                format!("{}/chat/completions", endpoint.trim_end_matches('/'))
            }
            RouteDecision::Proxied { relay_url } => relay_url.clone(),
        }
    }

    /// Bearer key to send, if any
    pub fn bearer_key(&self) -> Option<&str> {
        match self {
            RouteDecision::Custom { key, .. } => Some(key),
            RouteDecision::Proxied { .. } => None,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, RouteDecision::Custom { .. })
    }

    /// Short name for logs
    pub fn mode(&self) -> &'static str {
        match self {
            RouteDecision::Custom { .. } => "custom",
            RouteDecision::Proxied { .. } => "proxied",
        }
    }
}

/// Body of a streaming completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl CompletionRequest {
    /// Create a streaming request
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }

    /// Check the request against the relay's limits
    pub fn validate_for_relay(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(ArcanaError::InvalidInput(
                "a request needs at least one message".to_string(),
            ));
        }
        if self.messages.len() > MAX_RELAY_MESSAGES {
            return Err(ArcanaError::InvalidInput(format!(
                "too many messages for the relay ({} > {})",
                self.messages.len(),
                MAX_RELAY_MESSAGES
            )));
        }
        if let Some(index) = self
            .messages
            .iter()
            .position(|m| m.content.chars().count() > MAX_RELAY_CONTENT_CHARS)
        {
            return Err(ArcanaError::InvalidInput(format!(
                "message {} is longer than {} characters",
                index, MAX_RELAY_CONTENT_CHARS
            )));
        }
        Ok(())
    }
}

/// Opens a streaming completion and returns the response body
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open_stream(
        &self,
        route: &RouteDecision,
        request: &CompletionRequest,
    ) -> Result<ByteStream>;
}

/// Build a request id of the form `<prefix>_<unix-millis>_<8 hex chars>`
pub fn create_request_id(prefix: &str) -> String {
    format!(
        "{}_{}_{:08x}",
        prefix,
        chrono::Utc::now().timestamp_millis(),
        rand::random::<u32>()
    )
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    request_timeout: Duration,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    /// Create a transport with the default request timeout
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a transport with a custom request timeout.
    ///
    /// The timeout covers sending the request and receiving the headers;
    /// the body may keep streaming for as long as the model generates.
    pub fn with_timeout(request_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            request_timeout,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn open_stream(
        &self,
        route: &RouteDecision,
        request: &CompletionRequest,
    ) -> Result<ByteStream> {
        if !route.is_custom() {
            request.validate_for_relay()?;
        }

        let url = route.url();
        let request_id = create_request_id("arcana");

        tracing::debug!(
            target: "arcana.transport",
            mode = route.mode(),
            %url,
            model = %request.model,
            messages = request.messages.len(),
            %request_id,
            "opening completion stream"
        );

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .header("X-Request-ID", &request_id);

        if let Some(key) = route.bearer_key() {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = tokio::time::timeout(self.request_timeout, req.json(request).send())
            .await
            .map_err(|_| ArcanaError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                target: "arcana.transport",
                status = status.as_u16(),
                %request_id,
                "completion request rejected"
            );
            return Err(transport_error(status, &body));
        }

        if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(ArcanaError::StreamUnavailable);
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| ArcanaError::Stream(e.to_string()))
            });

        Ok(Box::pin(stream))
    }
}

/// Build a transport error from a rejected response
pub(crate) fn transport_error(status: StatusCode, body: &str) -> ArcanaError {
    ArcanaError::Transport {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        detail: extract_error_detail(body),
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

/// Pull a readable message out of an error response body.
///
/// Looks at `error.message`, `error.detail`, `detail` and a string `error`,
/// in that order.
pub fn extract_error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let as_text = |v: &serde_json::Value| v.as_str().map(str::to_string);

    if let Some(error) = &parsed.error {
        if let Some(message) = error.get("message").and_then(as_text) {
            return Some(message);
        }
        if let Some(detail) = error.get("detail").and_then(as_text) {
            return Some(detail);
        }
    }
    if let Some(detail) = parsed.detail.as_ref().and_then(as_text) {
        return Some(detail);
    }
    parsed.error.as_ref().and_then(as_text)
}
