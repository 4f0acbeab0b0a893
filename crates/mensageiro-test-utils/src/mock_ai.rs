// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI backend for deterministic testing.
//!
//! `MockAiBackend` answers every call from a FIFO of scripted outcomes,
//! falling back to a default reply when the script runs out.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use mensageiro_core::{
    AdapterType, AiBackend, AiConfig, HealthStatus, MediaPayload, MensageiroError, PluginAdapter,
    TextRequest,
};

/// The default answer when no outcome is scripted.
pub const DEFAULT_REPLY: &str = "mock response";

/// One scripted result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    Reply(String),
    /// Generic backend failure with the given message.
    Fail(String),
    /// Content-safety refusal.
    SafetyBlock,
}

impl MockOutcome {
    fn into_result(self) -> Result<String, MensageiroError> {
        match self {
            MockOutcome::Reply(text) => Ok(text),
            MockOutcome::Fail(message) => Err(MensageiroError::AiBackend {
                message,
                source: None,
            }),
            MockOutcome::SafetyBlock => Err(MensageiroError::from_backend_message(
                "candidate blocked: finishReason=SAFETY",
            )),
        }
    }
}

#[derive(Default)]
struct Calls {
    text: AtomicUsize,
    image: AtomicUsize,
    audio: AtomicUsize,
    video: AtomicUsize,
}

/// A mock AI backend with scripted outcomes and call counters.
pub struct MockAiBackend {
    script: Mutex<VecDeque<MockOutcome>>,
    delay: Option<Duration>,
    calls: Calls,
    text_requests: Mutex<Vec<TextRequest>>,
    media_configs: Mutex<Vec<AiConfig>>,
}

impl MockAiBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            delay: None,
            calls: Calls::default(),
            text_requests: Mutex::new(Vec::new()),
            media_configs: Mutex::new(Vec::new()),
        }
    }

    /// Pre-loads the script with plain replies.
    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().map(MockOutcome::Reply).collect()),
            ..Self::new()
        }
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn push(&self, outcome: MockOutcome) {
        self.script.lock().await.push_back(outcome);
    }

    pub async fn push_reply(&self, text: impl Into<String>) {
        self.push(MockOutcome::Reply(text.into())).await;
    }

    pub async fn push_failure(&self, message: impl Into<String>) {
        self.push(MockOutcome::Fail(message.into())).await;
    }

    pub fn text_calls(&self) -> usize {
        self.calls.text.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.calls.image.load(Ordering::SeqCst)
    }

    pub fn audio_calls(&self) -> usize {
        self.calls.audio.load(Ordering::SeqCst)
    }

    pub fn video_calls(&self) -> usize {
        self.calls.video.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.text_calls() + self.image_calls() + self.audio_calls() + self.video_calls()
    }

    /// Text requests received so far.
    pub async fn text_requests(&self) -> Vec<TextRequest> {
        self.text_requests.lock().await.clone()
    }

    /// Settings passed with media calls so far.
    pub async fn media_configs(&self) -> Vec<AiConfig> {
        self.media_configs.lock().await.clone()
    }

    async fn answer(&self) -> Result<String, MensageiroError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockOutcome::Reply(DEFAULT_REPLY.to_string()))
            .into_result()
    }
}

impl Default for MockAiBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockAiBackend {
    fn name(&self) -> &str {
        "mock-ai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::AiBackend
    }

    async fn health_check(&self) -> Result<HealthStatus, MensageiroError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MensageiroError> {
        Ok(())
    }
}

#[async_trait]
impl AiBackend for MockAiBackend {
    async fn process_text(&self, request: TextRequest) -> Result<String, MensageiroError> {
        self.calls.text.fetch_add(1, Ordering::SeqCst);
        self.text_requests.lock().await.push(request);
        self.answer().await
    }

    async fn process_image(
        &self,
        _media: &MediaPayload,
        _prompt: Option<&str>,
        config: &AiConfig,
    ) -> Result<String, MensageiroError> {
        self.calls.image.fetch_add(1, Ordering::SeqCst);
        self.media_configs.lock().await.push(config.clone());
        self.answer().await
    }

    async fn process_audio(
        &self,
        _media: &MediaPayload,
        _message_id: &str,
        config: &AiConfig,
    ) -> Result<String, MensageiroError> {
        self.calls.audio.fetch_add(1, Ordering::SeqCst);
        self.media_configs.lock().await.push(config.clone());
        self.answer().await
    }

    async fn process_video(
        &self,
        path: &Path,
        _prompt: Option<&str>,
        config: &AiConfig,
    ) -> Result<String, MensageiroError> {
        self.calls.video.fetch_add(1, Ordering::SeqCst);
        if !path.exists() {
            return Err(MensageiroError::Internal(format!(
                "video file {} does not exist",
                path.display()
            )));
        }
        self.media_configs.lock().await.push(config.clone());
        self.answer().await
    }
}
