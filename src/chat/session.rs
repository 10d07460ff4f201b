// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Reading session orchestration
//!
//! A [`ReadingSession`] drives one reading at a time through
//! `idle → streaming → {complete | error}`: it resolves configuration,
//! builds the prompts, streams the answer through the batcher, seeds the
//! conversation and hands the result to the recorder.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::chat::batcher::{ImmediateScheduler, RedrawScheduler, TextSubscriber, UpdateBatcher};
use crate::chat::followup::FollowUpChat;
use crate::chat::streaming::stream_completion;
use crate::config::defaults::DefaultLlmConfig;
use crate::config::resolver::{resolve, ResolvedConfig};
use crate::config::store::ConfigurationStore;
use crate::error::{ArcanaError, Result};
use crate::history::ReadingRecorder;
use crate::llm::message::ConversationHistory;
use crate::llm::transport::{CompletionRequest, StreamTransport};
use crate::reading::{PromptPair, ReadingRequest};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Streaming,
    Complete,
    Error,
}

/// Observable state of a reading
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisSession {
    pub status: SessionStatus,
    /// Text published so far; the full answer once complete
    pub accumulated_text: String,
    /// Set only when `status` is `Error`
    pub error_message: Option<String>,
    /// Model used for the current run
    pub model: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(target: "arcana.session", "session lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Runs readings and keeps the conversation they produce
pub struct ReadingSession {
    transport: Arc<dyn StreamTransport>,
    config_store: Arc<dyn ConfigurationStore>,
    defaults: DefaultLlmConfig,
    recorder: Option<Arc<dyn ReadingRecorder>>,
    scheduler: Arc<dyn RedrawScheduler>,
    subscribers: Vec<TextSubscriber>,
    state: Arc<Mutex<AnalysisSession>>,
    history: ConversationHistory,
    last_request: Option<ReadingRequest>,
    last_prompts: Option<PromptPair>,
    resolved: Option<ResolvedConfig>,
}

impl ReadingSession {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        config_store: Arc<dyn ConfigurationStore>,
        defaults: DefaultLlmConfig,
    ) -> Self {
        Self {
            transport,
            config_store,
            defaults,
            recorder: None,
            scheduler: Arc::new(ImmediateScheduler::new()),
            subscribers: Vec::new(),
            state: Arc::new(Mutex::new(AnalysisSession::default())),
            history: ConversationHistory::new(),
            last_request: None,
            last_prompts: None,
            resolved: None,
        }
    }

    /// Save finished readings through `recorder`
    pub fn with_recorder(mut self, recorder: Arc<dyn ReadingRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Publish text on the ticks of `scheduler`
    pub fn with_scheduler(mut self, scheduler: Arc<dyn RedrawScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Observe the text as it is published
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribers.push(Arc::new(subscriber));
    }

    /// Snapshot of the current state
    pub fn state(&self) -> AnalysisSession {
        lock(&self.state).clone()
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.state).status
    }

    /// Conversation seeded by the last successful reading
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Configuration used by the last run, if it got that far
    pub fn resolved(&self) -> Option<&ResolvedConfig> {
        self.resolved.as_ref()
    }

    pub fn last_request(&self) -> Option<&ReadingRequest> {
        self.last_request.as_ref()
    }

    /// Run a reading to completion. Returns `true` when the answer has content.
    pub async fn run(&mut self, request: ReadingRequest) -> bool {
        self.run_with_cancel(request, CancellationToken::new()).await
    }

    /// Run a reading that stops early when `cancel` fires
    pub async fn run_with_cancel(
        &mut self,
        request: ReadingRequest,
        cancel: CancellationToken,
    ) -> bool {
        self.reset();

        let prompts = match (&self.last_request, &self.last_prompts) {
            (Some(last), Some(prompts)) if last.same_reading(&request) => prompts.clone(),
            _ => request.prompts(),
        };
        self.last_prompts = Some(prompts.clone());
        self.last_request = Some(request.clone());

        match self.execute(&request, &prompts, &cancel).await {
            Ok(text) => {
                self.finish(&request, &prompts, text);
                true
            }
            Err(ArcanaError::EmptyResponse) => {
                tracing::info!(target: "arcana.session", "model returned no content");
                self.fail(&ArcanaError::EmptyResponse);
                false
            }
            Err(error) => {
                tracing::warn!(target: "arcana.session", %error, "reading failed");
                self.fail(&error);
                false
            }
        }
    }

    /// Run the previous reading again with another model
    pub async fn reinterpret(&mut self, model: impl Into<String>) -> bool {
        match self.last_request.clone() {
            Some(request) => self.run(request.with_model(model)).await,
            None => {
                self.reset();
                self.fail(&ArcanaError::InvalidInput(
                    "there is no reading to reinterpret".to_string(),
                ));
                false
            }
        }
    }

    /// Continue the conversation of a completed reading
    pub fn start_follow_up(&self) -> Option<FollowUpChat> {
        if self.status() != SessionStatus::Complete {
            return None;
        }
        let resolved = self.resolved.clone()?;
        let mut chat = FollowUpChat::new(
            Arc::clone(&self.transport),
            resolved,
            self.history.clone(),
        )
        .with_scheduler(Arc::clone(&self.scheduler));
        for subscriber in &self.subscribers {
            chat.subscribe_shared(Arc::clone(subscriber));
        }
        Some(chat)
    }

    fn reset(&mut self) {
        *lock(&self.state) = AnalysisSession::default();
        self.history = ConversationHistory::new();
        self.resolved = None;
    }

    async fn execute(
        &mut self,
        request: &ReadingRequest,
        prompts: &PromptPair,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let resolved = resolve(
            request.override_model.as_deref(),
            self.config_store.as_ref(),
            &self.defaults,
        )?;
        self.resolved = Some(resolved.clone());

        {
            let mut state = lock(&self.state);
            state.status = SessionStatus::Streaming;
            state.model = Some(resolved.model.clone());
        }
        tracing::info!(
            target: "arcana.session",
            model = %resolved.model,
            mode = resolved.route.mode(),
            spread = %request.spread_id,
            cards = request.items.len(),
            "starting reading"
        );

        let messages = ConversationHistory::opening(prompts).messages().to_vec();
        let completion = CompletionRequest::new(resolved.model.clone(), messages);
        let batcher = UpdateBatcher::new(Arc::clone(&self.scheduler), self.publisher());

        stream_completion(
            self.transport.as_ref(),
            &resolved.route,
            &completion,
            &batcher,
            cancel,
        )
        .await
    }

    /// Subscriber that mirrors published text into the state before fanning out
    fn publisher(&self) -> TextSubscriber {
        let state = Arc::clone(&self.state);
        let subscribers = self.subscribers.clone();
        Arc::new(move |text: &str| {
            {
                let mut state = lock(&state);
                state.accumulated_text.clear();
                state.accumulated_text.push_str(text);
            }
            for subscriber in &subscribers {
                subscriber(text);
            }
        })
    }

    fn finish(&mut self, request: &ReadingRequest, prompts: &PromptPair, text: String) {
        self.history = ConversationHistory::seeded(prompts, text.clone());

        if let Some(recorder) = &self.recorder {
            if let Err(error) = recorder.save(
                &request.question,
                &request.spread_name,
                &request.spread_id,
                &request.items,
                &text,
            ) {
                tracing::warn!(target: "arcana.session", %error, "failed to save reading");
            }
        }

        let mut state = lock(&self.state);
        state.status = SessionStatus::Complete;
        state.accumulated_text = text;
        state.error_message = None;
    }

    fn fail(&mut self, error: &ArcanaError) {
        let mut state = lock(&self.state);
        state.status = SessionStatus::Error;
        state.accumulated_text.clear();
        state.error_message = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{KEY_API_KEY, KEY_BASE_URL, KEY_MODEL};
    use crate::config::store::MemoryConfigStore;
    use crate::llm::message::Role;
    use crate::llm::mock_transport::{delta_line, ScriptedResponse, ScriptedTransport};
    use crate::reading::DrawnItem;

    #[derive(Default)]
    struct RecordingRecorder {
        saved: Mutex<Vec<String>>,
        fail: bool,
    }

    impl ReadingRecorder for RecordingRecorder {
        fn save(
            &self,
            _question: &str,
            _spread_name: &str,
            _spread_id: &str,
            _items: &[DrawnItem],
            final_text: &str,
        ) -> Result<()> {
            if self.fail {
                return Err(ArcanaError::Config("disk full".to_string()));
            }
            self.saved.lock().unwrap().push(final_text.to_string());
            Ok(())
        }
    }

    fn custom_store() -> Arc<MemoryConfigStore> {
        Arc::new(MemoryConfigStore::with_values([
            (KEY_BASE_URL, "https://api.example.com/v1"),
            (KEY_API_KEY, "sk-test"),
            (KEY_MODEL, "model-Y"),
        ]))
    }

    fn request() -> ReadingRequest {
        ReadingRequest::new(
            "Will it work?",
            "Single Card",
            "single",
            vec![DrawnItem::upright("Answer", "The Sun")],
        )
    }

    fn session(transport: &ScriptedTransport) -> ReadingSession {
        ReadingSession::new(
            Arc::new(transport.clone()),
            custom_store(),
            DefaultLlmConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_successful_reading() {
        let transport = ScriptedTransport::new(ScriptedResponse::deltas(&["A", "B"]));
        let recorder = Arc::new(RecordingRecorder::default());
        let mut session = session(&transport).with_recorder(recorder.clone());

        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.run(request()).await);

        let state = session.state();
        assert_eq!(state.status, SessionStatus::Complete);
        assert_eq!(state.accumulated_text, "AB");
        assert_eq!(state.error_message, None);
        assert_eq!(state.model.as_deref(), Some("model-Y"));

        let history = session.history().messages();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, Role::System);
        assert_eq!(history[1].role, Role::User);
        assert_eq!(history[2].content, "AB");

        assert_eq!(*recorder.saved.lock().unwrap(), vec!["AB".to_string()]);
    }

    #[tokio::test]
    async fn test_subscribers_see_final_text() {
        let transport = ScriptedTransport::new(ScriptedResponse::deltas(&["He", "llo"]));
        let mut session = session(&transport);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        session.subscribe(move |text| sink.lock().unwrap().push(text.to_string()));

        assert!(session.run(request()).await);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.last().map(String::as_str), Some("Hello"));
        for pair in seen.windows(2) {
            assert!(pair[1].starts_with(&pair[0]));
        }
    }

    #[tokio::test]
    async fn test_empty_result_is_not_success() {
        let transport = ScriptedTransport::new(ScriptedResponse::lines(["data: [DONE]"]));
        let recorder = Arc::new(RecordingRecorder::default());
        let mut session = session(&transport).with_recorder(recorder.clone());

        assert!(!session.run(request()).await);

        let state = session.state();
        assert_eq!(state.status, SessionStatus::Error);
        assert_eq!(
            state.error_message.as_deref(),
            Some("The model returned no content")
        );
        assert!(session.history().is_empty());
        assert!(recorder.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_stream_error() {
        let transport = ScriptedTransport::new(ScriptedResponse::lines([
            "data: {\"error\":\"rate limited\"}".to_string(),
            delta_line("ignored"),
        ]));
        let mut session = session(&transport);

        assert!(!session.run(request()).await);

        let state = session.state();
        assert_eq!(state.status, SessionStatus::Error);
        assert_eq!(state.error_message.as_deref(), Some("rate limited"));
        assert!(state.accumulated_text.is_empty());
        assert!(session.start_follow_up().is_none());
    }

    #[tokio::test]
    async fn test_missing_body_fails_reading() {
        let transport = ScriptedTransport::new(ScriptedResponse::NoBody);
        let recorder = Arc::new(RecordingRecorder::default());
        let mut session = session(&transport).with_recorder(recorder.clone());

        assert!(!session.run(request()).await);

        let state = session.state();
        assert_eq!(state.status, SessionStatus::Error);
        assert_eq!(
            state.error_message.as_deref(),
            Some("Unable to read response stream")
        );
        assert!(state.accumulated_text.is_empty());
        assert!(recorder.saved.lock().unwrap().is_empty());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_configuration_fails_before_network() {
        let transport = ScriptedTransport::new(ScriptedResponse::deltas(&["A"]));
        let mut session = ReadingSession::new(
            Arc::new(transport.clone()),
            Arc::new(MemoryConfigStore::new()),
            DefaultLlmConfig::default(),
        );

        assert!(!session.run(request()).await);
        assert_eq!(session.status(), SessionStatus::Error);
        assert!(session
            .state()
            .error_message
            .unwrap()
            .contains("configuration missing"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_recorder_failure_keeps_success() {
        let transport = ScriptedTransport::new(ScriptedResponse::deltas(&["A"]));
        let recorder = Arc::new(RecordingRecorder {
            fail: true,
            ..Default::default()
        });
        let mut session = session(&transport).with_recorder(recorder);

        assert!(session.run(request()).await);
        assert_eq!(session.status(), SessionStatus::Complete);
    }

    #[tokio::test]
    async fn test_reinterpret_uses_override_and_same_prompts() {
        let transport = ScriptedTransport::with_responses(vec![
            ScriptedResponse::deltas(&["first"]),
            ScriptedResponse::deltas(&["second"]),
        ]);
        let mut session = session(&transport);

        assert!(session.run(request()).await);
        assert!(session.reinterpret("model-X").await);

        let requests = transport.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].1.model, "model-Y");
        assert_eq!(requests[1].1.model, "model-X");
        assert_eq!(requests[0].1.messages, requests[1].1.messages);
        assert_eq!(session.state().accumulated_text, "second");
    }

    #[tokio::test]
    async fn test_rerun_resets_previous_error() {
        let transport = ScriptedTransport::with_responses(vec![
            ScriptedResponse::Status(500, "Internal Server Error".to_string()),
            ScriptedResponse::deltas(&["ok"]),
        ]);
        let mut session = session(&transport);

        assert!(!session.run(request()).await);
        assert!(session
            .state()
            .error_message
            .unwrap()
            .starts_with("API request failed: 500"));

        assert!(session.run(request()).await);
        assert_eq!(session.state().error_message, None);
        assert_eq!(session.state().accumulated_text, "ok");
    }

    #[tokio::test]
    async fn test_reinterpret_without_reading() {
        let transport = ScriptedTransport::new(ScriptedResponse::deltas(&["A"]));
        let mut session = session(&transport);

        assert!(!session.reinterpret("model-X").await);
        assert_eq!(session.status(), SessionStatus::Error);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let transport = ScriptedTransport::new(ScriptedResponse::deltas(&["A"]));
        let mut session = session(&transport);
        let token = CancellationToken::new();
        token.cancel();

        assert!(!session.run_with_cancel(request(), token).await);
        assert_eq!(session.state().error_message.as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn test_start_follow_up_after_success() {
        let transport = ScriptedTransport::new(ScriptedResponse::deltas(&["A"]));
        let mut session = session(&transport);

        assert!(session.start_follow_up().is_none());
        assert!(session.run(request()).await);

        let chat = session.start_follow_up().unwrap();
        assert_eq!(chat.history().len(), 3);
        assert_eq!(chat.model(), "model-Y");
    }
}
