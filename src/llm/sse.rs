// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Server-sent event frame parsing
//!
//! Completion endpoints stream one event per line in the form
//! `data: <json>`, ending with `data: [DONE]`. Network chunks do not line up
//! with those lines, so both the UTF-8 decoding and the line splitting carry
//! incomplete input over to the next chunk.

use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

use crate::error::Result;
use crate::llm::transport::ByteStream;

/// Prefix of a line that carries a payload
pub const DATA_PREFIX: &str = "data: ";

/// Payload marking the logical end of the stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Stream of parsed JSON payloads in arrival order
pub type PayloadStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// One classified protocol line
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFrame {
    pub is_data_line: bool,
    pub is_terminator: bool,
    pub payload: Option<Value>,
}

impl StreamFrame {
    /// Classify a single line (surrounding whitespace is ignored)
    pub fn parse_line(line: &str) -> Self {
        let line = line.trim();
        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            return Self {
                is_data_line: false,
                is_terminator: false,
                payload: None,
            };
        };

        if data == DONE_SENTINEL {
            return Self {
                is_data_line: true,
                is_terminator: true,
                payload: None,
            };
        }

        Self {
            is_data_line: true,
            is_terminator: false,
            payload: serde_json::from_str(data).ok(),
        }
    }
}

/// Incremental UTF-8 decoder that holds back split multi-byte sequences
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `bytes` (plus any held-back bytes) as possible
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        // Invalid sequence in the middle: replace it and keep going
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        // Truncated sequence at the end: wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush whatever is still held back, lossily
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Splits decoded text into frames and yields their JSON payloads
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: String,
    terminated: bool,
    discarded: usize,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded chunk; returns payloads of every completed line
    pub fn push(&mut self, chunk: &str) -> Vec<Value> {
        self.buffer.push_str(chunk);
        let mut payloads = Vec::new();

        while let Some(line_end) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=line_end).collect();
            self.handle_line(&line, &mut payloads);
        }

        payloads
    }

    /// Process the trailing partial line once the transport is exhausted
    pub fn finish(&mut self) -> Vec<Value> {
        let mut payloads = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        if !rest.trim().is_empty() {
            self.handle_line(&rest, &mut payloads);
        }
        payloads
    }

    /// Whether the `[DONE]` sentinel has been seen
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Number of data lines dropped because their payload was not JSON
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    fn handle_line(&mut self, line: &str, payloads: &mut Vec<Value>) {
        let frame = StreamFrame::parse_line(line);
        if !frame.is_data_line || self.terminated {
            return;
        }

        if frame.is_terminator {
            tracing::debug!(target: "arcana.sse", "received stream terminator");
            self.terminated = true;
            return;
        }

        match frame.payload {
            Some(payload) => payloads.push(payload),
            None => {
                self.discarded += 1;
                tracing::trace!(
                    target: "arcana.sse",
                    line = %line.trim(),
                    "discarding malformed frame"
                );
            }
        }
    }
}

/// Turn a raw byte stream into a stream of frame payloads.
///
/// The byte stream is drained to the end even after the terminator so the
/// connection finishes cleanly; payloads after it are not emitted.
pub fn frame_payloads(bytes: ByteStream) -> PayloadStream {
    Box::pin(async_stream::try_stream! {
        let mut decoder = Utf8ChunkDecoder::new();
        let mut parser = FrameParser::new();

        for await chunk in bytes {
            let chunk = chunk?;
            let text = decoder.decode(&chunk);
            for payload in parser.push(&text) {
                yield payload;
            }
        }

        let tail = decoder.finish();
        let mut rest = parser.push(&tail);
        rest.extend(parser.finish());
        for payload in rest {
            yield payload;
        }

        if parser.discarded() > 0 {
            tracing::debug!(
                target: "arcana.sse",
                discarded = parser.discarded(),
                "stream contained malformed frames"
            );
        }
    })
}
