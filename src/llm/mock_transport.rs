// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scripted transport for testing
//!
//! Replays pre-configured response bodies chunk by chunk, so sessions can be
//! exercised without a network. Each call to `open_stream` consumes the next
//! queued response; the last one is repeated once the queue runs dry.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ArcanaError, Result};
use crate::llm::transport::{ByteStream, CompletionRequest, RouteDecision, StreamTransport};

/// A pre-configured response
#[derive(Clone, Debug)]
pub enum ScriptedResponse {
    /// Body delivered in the given chunks
    Chunks(Vec<Vec<u8>>),
    /// Body chunks followed by a read failure
    ChunksThenError(Vec<Vec<u8>>, String),
    /// Non-success HTTP status
    Status(u16, String),
    /// Response without a readable body
    NoBody,
}

impl ScriptedResponse {
    /// One chunk per line of the given SSE lines (newline appended)
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ScriptedResponse::Chunks(
            lines
                .into_iter()
                .map(|l| format!("{}\n", l.as_ref()).into_bytes())
                .collect(),
        )
    }

    /// A full stream of text deltas followed by `[DONE]`
    pub fn deltas(deltas: &[&str]) -> Self {
        let mut lines: Vec<String> = deltas.iter().map(|d| delta_line(d)).collect();
        lines.push("data: [DONE]".to_string());
        Self::lines(lines)
    }
}

/// Render a standard `choices[0].delta.content` frame
pub fn delta_line(text: &str) -> String {
    format!(
        "data: {}",
        serde_json::json!({"choices": [{"delta": {"content": text}}]})
    )
}

/// A transport that replays scripted responses
#[derive(Clone)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<Vec<ScriptedResponse>>>,
    call_count: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<(RouteDecision, CompletionRequest)>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Scripted transport lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl ScriptedTransport {
    /// Create a transport that always replays `response`
    pub fn new(response: ScriptedResponse) -> Self {
        Self::with_responses(vec![response])
    }

    /// Queue responses returned in order
    pub fn with_responses(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times `open_stream` was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// All recorded requests with their routes
    pub fn recorded_requests(&self) -> Vec<(RouteDecision, CompletionRequest)> {
        lock(&self.recorded).clone()
    }

    /// The last request made
    pub fn last_request(&self) -> Option<CompletionRequest> {
        lock(&self.recorded).last().map(|(_, r)| r.clone())
    }

    fn next_response(&self) -> Option<ScriptedResponse> {
        let mut responses = lock(&self.responses);
        if responses.len() > 1 {
            Some(responses.remove(0))
        } else {
            responses.first().cloned()
        }
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn open_stream(
        &self,
        route: &RouteDecision,
        request: &CompletionRequest,
    ) -> Result<ByteStream> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.recorded).push((route.clone(), request.clone()));

        if !route.is_custom() {
            request.validate_for_relay()?;
        }

        let response = self
            .next_response()
            .ok_or_else(|| ArcanaError::Stream("no scripted response".to_string()))?;

        match response {
            ScriptedResponse::Chunks(chunks) => {
                let items: Vec<Result<Vec<u8>>> = chunks.into_iter().map(Ok).collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
            ScriptedResponse::ChunksThenError(chunks, message) => {
                let mut items: Vec<Result<Vec<u8>>> = chunks.into_iter().map(Ok).collect();
                items.push(Err(ArcanaError::Stream(message)));
                Ok(Box::pin(futures::stream::iter(items)))
            }
            ScriptedResponse::Status(status, status_text) => Err(ArcanaError::Transport {
                status,
                status_text,
                detail: None,
            }),
            ScriptedResponse::NoBody => Err(ArcanaError::StreamUnavailable),
        }
    }
}
