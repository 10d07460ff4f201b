// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for Arcana
//!
//! Chat messages, the streaming transport and the event-stream parser.

pub mod message;
pub mod mock_transport;
pub mod sse;
pub mod transport;

pub use message::*;
pub use transport::*;
