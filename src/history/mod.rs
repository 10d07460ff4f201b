// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! History management for Arcana readings
//!
//! Finished readings are saved best-effort so they can be listed, shown
//! again and continued as a conversation.

pub mod store;

pub use store::{HistoryStore, ReadingRecord, ReadingRecorder, MAX_HISTORY_ITEMS};
