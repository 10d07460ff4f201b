// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Reading sessions and follow-up chat
//!
//! This module turns a streamed completion into observable session state:
//! delta accumulation, redraw batching, the session state machine and the
//! follow-up conversation.

pub mod batcher;
pub mod followup;
pub mod session;
pub mod streaming;

pub use batcher::{
    FrameHandle, ImmediateScheduler, IntervalScheduler, ManualScheduler, RedrawScheduler,
    TextSubscriber, UpdateBatcher,
};
pub use followup::FollowUpChat;
pub use session::{AnalysisSession, ReadingSession, SessionStatus};
pub use streaming::{extract_delta, extract_stream_error, stream_completion, DeltaAccumulator};
