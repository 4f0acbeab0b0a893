// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat platform for deterministic testing.
//!
//! `MockPlatform` implements `ChatPlatform` with an injectable event queue,
//! scripted lookups (chats, mentions, quoted messages, media) and captured
//! outbound messages.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use mensageiro_core::{
    AdapterType, ChatInfo, ChatPlatform, HealthStatus, InboundEvent, MediaPayload,
    MensageiroError, MessageId, OutboundMessage, PluginAdapter, QuotedMessage,
};

#[derive(Default)]
struct Lookups {
    chats: HashMap<String, ChatInfo>,
    mentions: HashMap<String, Vec<String>>,
    quoted: HashMap<String, QuotedMessage>,
    media: HashMap<String, MediaPayload>,
}

#[derive(Default)]
struct Inbox {
    events: VecDeque<InboundEvent>,
    closed: bool,
}

/// A scripted chat platform.
///
/// Chats default to private unless the id ends in `@g.us`. Media, mentions
/// and quoted messages are keyed by message id.
pub struct MockPlatform {
    bot_id: Option<String>,
    inbox: Mutex<Inbox>,
    notify: Notify,
    lookups: Mutex<Lookups>,
    sent: Mutex<Vec<OutboundMessage>>,
    fail_sends: AtomicBool,
    send_attempts: AtomicUsize,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            bot_id: None,
            inbox: Mutex::new(Inbox::default()),
            notify: Notify::new(),
            lookups: Mutex::new(Lookups::default()),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            send_attempts: AtomicUsize::new(0),
        }
    }

    /// A platform that reports `bot_id` as the bot account.
    pub fn with_bot_id(bot_id: impl Into<String>) -> Self {
        Self {
            bot_id: Some(bot_id.into()),
            ..Self::new()
        }
    }

    /// Queues an event for `next_event`.
    pub async fn push_event(&self, event: InboundEvent) {
        self.inbox.lock().await.events.push_back(event);
        self.notify.notify_one();
    }

    /// Makes `next_event` return `None` once the queue is drained.
    pub async fn close(&self) {
        self.inbox.lock().await.closed = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub async fn set_chat(&self, chat: ChatInfo) {
        self.lookups.lock().await.chats.insert(chat.id.clone(), chat);
    }

    pub async fn set_mentions(&self, message_id: &str, mentions: Vec<String>) {
        self.lookups
            .lock()
            .await
            .mentions
            .insert(message_id.to_string(), mentions);
    }

    pub async fn set_quoted(&self, message_id: &str, quoted: QuotedMessage) {
        self.lookups
            .lock()
            .await
            .quoted
            .insert(message_id.to_string(), quoted);
    }

    pub async fn set_media(&self, message_id: &str, media: MediaPayload) {
        self.lookups
            .lock()
            .await
            .media
            .insert(message_id.to_string(), media);
    }

    /// While set, every `send` fails with a delivery error.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Number of `send` calls, failed ones included.
    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    /// Messages that were sent successfully.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Texts of the messages sent to `target`, in order.
    pub async fn texts_to(&self, target: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.target == target)
            .map(|m| m.text.clone())
            .collect()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockPlatform {
    fn name(&self) -> &str {
        "mock-platform"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, MensageiroError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MensageiroError> {
        self.close().await;
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for MockPlatform {
    async fn connect(&self) -> Result<(), MensageiroError> {
        Ok(())
    }

    async fn next_event(&self) -> Option<InboundEvent> {
        loop {
            {
                let mut inbox = self.inbox.lock().await;
                if let Some(event) = inbox.events.pop_front() {
                    return Some(event);
                }
                if inbox.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    async fn chat(&self, event: &InboundEvent) -> Result<ChatInfo, MensageiroError> {
        let lookups = self.lookups.lock().await;
        Ok(lookups.chats.get(&event.from).cloned().unwrap_or_else(|| ChatInfo {
            id: event.from.clone(),
            name: None,
            is_group: event.from.ends_with("@g.us"),
        }))
    }

    async fn mentions(&self, event: &InboundEvent) -> Result<Vec<String>, MensageiroError> {
        Ok(self
            .lookups
            .lock()
            .await
            .mentions
            .get(&event.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn quoted_message(
        &self,
        event: &InboundEvent,
    ) -> Result<Option<QuotedMessage>, MensageiroError> {
        Ok(self.lookups.lock().await.quoted.get(&event.id).cloned())
    }

    async fn download_media(&self, event: &InboundEvent) -> Result<MediaPayload, MensageiroError> {
        self.lookups
            .lock()
            .await
            .media
            .get(&event.id)
            .cloned()
            .ok_or_else(|| MensageiroError::Internal(format!("no media scripted for {}", event.id)))
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, MensageiroError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(MensageiroError::Delivery {
                message: format!("mock delivery to {} failed", msg.target),
                source: None,
            });
        }
        self.sent.lock().await.push(msg);
        Ok(MessageId(format!("mock-msg-{}", uuid::Uuid::new_v4())))
    }

    fn bot_id(&self) -> Option<String> {
        self.bot_id.clone()
    }
}
