// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Mensageiro engine.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::MensageiroError;

/// Unique identifier for a message sent through the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Platform,
    AiBackend,
    TransactionStore,
    ConfigStore,
    JobQueue,
}

// --- Inbound events ---

/// What a transaction is about. Commands never become transactions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
}

/// Platform-level type of an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Chat,
    Image,
    Audio,
    /// Push-to-talk voice note.
    Ptt,
    Video,
    Document,
    Sticker,
    Notification,
    E2eNotification,
    GroupNotification,
    Gp2,
    CallLog,
    Revoked,
    #[serde(other)]
    Unknown,
}

impl EventKind {
    /// System and membership notifications never get an answer.
    pub fn is_system(&self) -> bool {
        matches!(
            self,
            EventKind::Notification
                | EventKind::E2eNotification
                | EventKind::GroupNotification
                | EventKind::Gp2
                | EventKind::CallLog
                | EventKind::Revoked
        )
    }

    /// Media kind handled by the engine, if any.
    pub fn media_kind(&self) -> Option<MessageKind> {
        match self {
            EventKind::Image => Some(MessageKind::Image),
            EventKind::Audio | EventKind::Ptt => Some(MessageKind::Audio),
            EventKind::Video => Some(MessageKind::Video),
            _ => None,
        }
    }
}

/// An inbound event received from the chat platform.
///
/// Chat details, mentions, the quoted message and media bytes are not part of
/// the event; they are fetched lazily through [`crate::ChatPlatform`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Platform message identifier.
    pub id: String,
    /// Chat the event came from (private chat id or group id).
    pub from: String,
    /// Actual sender inside a group chat.
    #[serde(default)]
    pub author: Option<String>,
    /// Text body or media caption.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub has_media: bool,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub has_quoted_msg: bool,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub timestamp: i64,
}

impl InboundEvent {
    /// Sender of the event: the group author when present, otherwise the chat.
    pub fn sender_id(&self) -> &str {
        self.author.as_deref().unwrap_or(&self.from)
    }
}

/// Chat metadata resolved from an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
}

/// The message an inbound event replies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedMessage {
    pub id: String,
    /// True when the quoted message was sent by the bot account.
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// Downloaded media bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub data: Vec<u8>,
    pub mime_type: String,
    #[serde(default)]
    pub filename: Option<String>,
}

impl MediaPayload {
    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

impl std::fmt::Debug for MediaPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPayload")
            .field("size_bytes", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("filename", &self.filename)
            .finish()
    }
}

// --- Outbound delivery ---

/// Delivery flags forwarded to the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    /// Platform message id to quote in the reply.
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Set by the recovery coordinator when redelivering after a restart.
    #[serde(default)]
    pub is_recovered_message: bool,
}

/// A message to be sent via the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub target: String,
    pub text: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub options: SendOptions,
}

impl OutboundMessage {
    /// A plain reply that is not tied to a transaction.
    pub fn reply(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            text: text.into(),
            transaction_id: None,
            options: SendOptions::default(),
        }
    }
}

// --- Per-chat configuration ---

/// How verbose media descriptions should be.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DescriptionMode {
    #[default]
    Short,
    Long,
}

/// Keys accepted by `config get` / `config set`.
pub const CHAT_CONFIG_KEYS: &[&str] = &[
    "media_image",
    "media_audio",
    "media_video",
    "description_mode",
];

/// Per-chat settings owned by the config collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "enabled")]
    pub media_image: bool,
    #[serde(default = "enabled")]
    pub media_audio: bool,
    #[serde(default = "enabled")]
    pub media_video: bool,
    #[serde(default)]
    pub description_mode: DescriptionMode,
    /// Name of the active named prompt.
    #[serde(default)]
    pub active_prompt: Option<String>,
}

fn enabled() -> bool {
    true
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            media_image: true,
            media_audio: true,
            media_video: true,
            description_mode: DescriptionMode::Short,
            active_prompt: None,
        }
    }
}

impl ChatConfig {
    /// Whether the given kind may be processed in this chat. Text is always allowed.
    pub fn allows(&self, kind: MessageKind) -> bool {
        match kind {
            MessageKind::Text => true,
            MessageKind::Image => self.media_image,
            MessageKind::Audio => self.media_audio,
            MessageKind::Video => self.media_video,
        }
    }

    /// Reads a single setting rendered as text.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "media_image" => Some(self.media_image.to_string()),
            "media_audio" => Some(self.media_audio.to_string()),
            "media_video" => Some(self.media_video.to_string()),
            "description_mode" => Some(self.description_mode.to_string()),
            _ => None,
        }
    }

    /// All settings in display order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        CHAT_CONFIG_KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|value| (*key, value)))
            .collect()
    }

    /// Updates a single setting from its textual form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), MensageiroError> {
        match key {
            "media_image" => self.media_image = parse_flag(key, value)?,
            "media_audio" => self.media_audio = parse_flag(key, value)?,
            "media_video" => self.media_video = parse_flag(key, value)?,
            "description_mode" => {
                self.description_mode = match value.trim().to_lowercase().as_str() {
                    "short" | "curto" => DescriptionMode::Short,
                    "long" | "longo" => DescriptionMode::Long,
                    other => {
                        return Err(MensageiroError::Validation(format!(
                            "invalid value `{other}` for description_mode (expected short or long)"
                        )));
                    }
                }
            }
            other => {
                return Err(MensageiroError::Validation(format!(
                    "unknown config key `{other}`"
                )));
            }
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, MensageiroError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "on" | "sim" | "1" => Ok(true),
        "false" | "off" | "nao" | "não" | "0" => Ok(false),
        other => Err(MensageiroError::Validation(format!(
            "invalid value `{other}` for {key} (expected true or false)"
        ))),
    }
}

/// A named prompt stored per chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPrompt {
    pub name: String,
    pub text: String,
}

// --- AI backend requests ---

/// Context for a text completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRequest {
    pub chat_id: String,
    pub sender_id: String,
    pub text: String,
    /// Active named prompt of the chat.
    pub system_prompt: Option<String>,
    /// Body of the quoted message, when replying.
    pub quoted_text: Option<String>,
}

/// Per-call settings for media processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiConfig {
    pub description_mode: DescriptionMode,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_event_kinds() {
        assert!(EventKind::Notification.is_system());
        assert!(EventKind::Gp2.is_system());
        assert!(!EventKind::Chat.is_system());
        assert!(!EventKind::Image.is_system());
    }

    #[test]
    fn voice_notes_are_audio() {
        assert_eq!(EventKind::Ptt.media_kind(), Some(MessageKind::Audio));
        assert_eq!(EventKind::Sticker.media_kind(), None);
    }

    #[test]
    fn unknown_event_type_deserializes_to_unknown() {
        let json = serde_json::json!({
            "id": "m1",
            "from": "5511@c.us",
            "type": "poll_creation",
        });
        let event: InboundEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.kind, EventKind::Unknown);
        assert!(!event.has_media);
        assert_eq!(event.sender_id(), "5511@c.us");
    }

    #[test]
    fn sender_prefers_group_author() {
        let event = InboundEvent {
            id: "m1".into(),
            from: "123@g.us".into(),
            author: Some("5511@c.us".into()),
            body: String::new(),
            has_media: false,
            kind: EventKind::Chat,
            has_quoted_msg: false,
            timestamp: 0,
        };
        assert_eq!(event.sender_id(), "5511@c.us");
    }

    #[test]
    fn chat_config_set_and_get() {
        let mut config = ChatConfig::default();
        config.set("media_audio", "off").unwrap();
        config.set("description_mode", "longo").unwrap();
        assert_eq!(config.get("media_audio").as_deref(), Some("false"));
        assert_eq!(config.description_mode, DescriptionMode::Long);
        assert!(!config.allows(MessageKind::Audio));
        assert!(config.allows(MessageKind::Text));
    }

    #[test]
    fn chat_config_rejects_unknown_key_and_bad_value() {
        let mut config = ChatConfig::default();
        assert!(config.set("volume", "11").is_err());
        assert!(config.set("media_video", "maybe").is_err());
        assert_eq!(config, ChatConfig::default());
    }

    #[test]
    fn entries_follow_key_order() {
        let keys: Vec<_> = ChatConfig::default()
            .entries()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, CHAT_CONFIG_KEYS);
    }

    #[test]
    fn media_payload_debug_hides_bytes() {
        let media = MediaPayload {
            data: vec![0u8; 4],
            mime_type: "image/jpeg".into(),
            filename: None,
        };
        let rendered = format!("{media:?}");
        assert!(rendered.contains("size_bytes: 4"));
        assert!(!rendered.contains("[0, 0"));
    }
}
