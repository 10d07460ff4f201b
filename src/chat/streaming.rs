// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming response handling
//!
//! Turns frame payloads into text. The accumulation logic is kept apart from
//! the I/O so it can be driven directly in tests.

use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::chat::batcher::UpdateBatcher;
use crate::error::{ArcanaError, Result};
use crate::llm::sse::frame_payloads;
use crate::llm::transport::{CompletionRequest, RouteDecision, StreamTransport};

/// Used when an `error` field is present but says nothing
pub const UNSPECIFIED_STREAM_ERROR: &str = "The model reported an unspecified error";

/// Message carried by a top-level `error` field, if the payload has one.
///
/// A blank error string counts as no error at all; an object without a
/// readable message falls back to [`UNSPECIFIED_STREAM_ERROR`].
pub fn extract_stream_error(payload: &Value) -> Option<String> {
    let error = payload.get("error")?;
    match error {
        Value::Null => None,
        Value::String(message) => {
            let message = message.trim();
            (!message.is_empty()).then(|| message.to_string())
        }
        Value::Object(fields) => Some(
            fields
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| fields.get("detail").and_then(Value::as_str))
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .unwrap_or(UNSPECIFIED_STREAM_ERROR)
                .to_string(),
        ),
        other => Some(other.to_string()),
    }
}

/// Text fragment of a payload: `choices[0].delta.content`, else `content`
pub fn extract_delta(payload: &Value) -> Option<&str> {
    let delta = payload
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty());

    delta.or_else(|| {
        payload
            .get("content")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    })
}

/// Accumulates text deltas; the buffer only ever grows
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    text: String,
    delta_count: usize,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one payload. Returns whether the text grew.
    pub fn process(&mut self, payload: &Value) -> Result<bool> {
        if let Some(message) = extract_stream_error(payload) {
            return Err(ArcanaError::InStream(message));
        }

        match extract_delta(payload) {
            Some(fragment) => {
                self.text.push_str(fragment);
                self.delta_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the text has anything besides whitespace
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn delta_count(&self) -> usize {
        self.delta_count
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Run one streaming completion, publishing through `batcher` as text grows.
///
/// Returns the full accumulated text. A stream that ends with nothing but
/// whitespace is [`ArcanaError::EmptyResponse`]. On success the batcher has
/// published that exact text last; on failure it is stopped without a final
/// flush.
pub async fn stream_completion(
    transport: &dyn StreamTransport,
    route: &RouteDecision,
    request: &CompletionRequest,
    batcher: &UpdateBatcher,
    cancel: &CancellationToken,
) -> Result<String> {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ArcanaError::Cancelled),
        result = drive(transport, route, request, batcher) => result,
    };

    match result {
        Ok(accumulator) if accumulator.has_content() => {
            batcher.complete();
            tracing::debug!(
                target: "arcana.session",
                deltas = accumulator.delta_count(),
                chars = accumulator.text().len(),
                "stream finished"
            );
            Ok(accumulator.into_text())
        }
        Ok(accumulator) => {
            batcher.cancel();
            tracing::debug!(
                target: "arcana.session",
                deltas = accumulator.delta_count(),
                "stream finished without content"
            );
            Err(ArcanaError::EmptyResponse)
        }
        Err(error) => {
            batcher.cancel();
            Err(error)
        }
    }
}

async fn drive(
    transport: &dyn StreamTransport,
    route: &RouteDecision,
    request: &CompletionRequest,
    batcher: &UpdateBatcher,
) -> Result<DeltaAccumulator> {
    let bytes = transport.open_stream(route, request).await?;
    let mut payloads = frame_payloads(bytes);
    let mut accumulator = DeltaAccumulator::new();

    while let Some(payload) = payloads.next().await {
        if accumulator.process(&payload?)? {
            batcher.update(accumulator.text());
        }
    }

    Ok(accumulator)
}
