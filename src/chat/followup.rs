// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Follow-up questions about a finished reading

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::chat::batcher::{ImmediateScheduler, RedrawScheduler, TextSubscriber, UpdateBatcher};
use crate::chat::streaming::stream_completion;
use crate::config::resolver::ResolvedConfig;
use crate::error::{ArcanaError, Result};
use crate::llm::message::{ChatMessage, ConversationHistory};
use crate::llm::transport::{CompletionRequest, StreamTransport};

/// Continues a reading's conversation.
///
/// Every exchange re-sends the whole history. A failed or empty exchange
/// leaves the history as it was before the question.
pub struct FollowUpChat {
    transport: Arc<dyn StreamTransport>,
    resolved: ResolvedConfig,
    history: ConversationHistory,
    scheduler: Arc<dyn RedrawScheduler>,
    subscribers: Vec<TextSubscriber>,
}

impl FollowUpChat {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        resolved: ResolvedConfig,
        history: ConversationHistory,
    ) -> Self {
        Self {
            transport,
            resolved,
            history,
            scheduler: Arc::new(ImmediateScheduler::new()),
            subscribers: Vec::new(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn RedrawScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Observe each answer as it streams in
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribers.push(Arc::new(subscriber));
    }

    pub(crate) fn subscribe_shared(&mut self, subscriber: TextSubscriber) {
        self.subscribers.push(subscriber);
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn model(&self) -> &str {
        &self.resolved.model
    }

    /// Ask a follow-up question and return the answer
    pub async fn send(&mut self, message: &str) -> Result<String> {
        self.send_with_cancel(message, CancellationToken::new()).await
    }

    pub async fn send_with_cancel(
        &mut self,
        message: &str,
        cancel: CancellationToken,
    ) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ArcanaError::InvalidInput(
                "follow-up message is empty".to_string(),
            ));
        }

        self.history.push(ChatMessage::user(message));
        tracing::debug!(
            target: "arcana.session",
            turns = self.history.len(),
            "sending follow-up"
        );

        let outcome = self.exchange(&cancel).await;
        match outcome {
            Ok(answer) => {
                self.history.push(ChatMessage::assistant(answer.clone()));
                Ok(answer)
            }
            Err(error) => {
                self.history.pop();
                tracing::warn!(target: "arcana.session", %error, "follow-up failed");
                Err(error)
            }
        }
    }

    async fn exchange(&self, cancel: &CancellationToken) -> Result<String> {
        let request = CompletionRequest::new(
            self.resolved.model.clone(),
            self.history.messages().to_vec(),
        );
        let subscribers = self.subscribers.clone();
        let publisher: TextSubscriber = Arc::new(move |text: &str| {
            for subscriber in &subscribers {
                subscriber(text);
            }
        });
        let batcher = UpdateBatcher::new(Arc::clone(&self.scheduler), publisher);

        stream_completion(
            self.transport.as_ref(),
            &self.resolved.route,
            &request,
            &batcher,
            cancel,
        )
        .await
    }
}
