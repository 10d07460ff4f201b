// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Arcana - streaming tarot readings from OpenAI-compatible endpoints.
//!
//! This crate exposes the shared runtime used by the `arcana` CLI
//! (`src/main.rs`).
//!
//! Architecture highlights:
//! - `config`: settings file, configuration store and model/route resolution
//! - `reading`: drawn cards, spreads and prompt construction
//! - `llm`: streaming transport, event-frame parsing and chat messages
//! - `chat`: delta accumulation, redraw batching, sessions and follow-ups
//! - `history`: saved readings

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod reading;

pub use error::{ArcanaError, Result};
