// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message types for LLM interactions
//!
//! Defines the chat messages sent to the completion endpoint and the
//! conversation history that is replayed on follow-up turns.

use serde::{Deserialize, Serialize};

use crate::reading::PromptPair;

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: Role,
    /// Text of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered turns of one reading conversation.
///
/// Serializes as a plain JSON array so it can be sent as the `messages`
/// field of a completion request unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// The opening exchange sent for a reading: system then user prompt
    pub fn opening(prompts: &PromptPair) -> Self {
        Self {
            messages: vec![
                ChatMessage::system(prompts.system_prompt.clone()),
                ChatMessage::user(prompts.user_prompt.clone()),
            ],
        }
    }

    /// The seeded history of a finished reading
    pub fn seeded(prompts: &PromptPair, answer: impl Into<String>) -> Self {
        let mut history = Self::opening(prompts);
        history.push(ChatMessage::assistant(answer));
        history
    }

    /// Append a message
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Remove and return the last message
    pub(crate) fn pop(&mut self) -> Option<ChatMessage> {
        self.messages.pop()
    }

    /// All messages in order
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<ChatMessage>> for ConversationHistory {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }
}
