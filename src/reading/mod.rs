// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Reading inputs and prompt construction
//!
//! A reading is a question, a spread and the ordered cards drawn into it.
//! This module turns that domain input into the prompt pair sent to the model.

pub mod prompts;
pub mod spreads;

pub use prompts::*;
pub use spreads::Spread;
