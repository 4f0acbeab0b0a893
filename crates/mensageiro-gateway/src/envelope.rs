// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON bodies exchanged with the bridge, and the short-lived store of event
//! details that back the lazy platform accessors.

use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use mensageiro_core::{ChatInfo, InboundEvent, MediaPayload, MensageiroError, QuotedMessage};

/// Body of `POST /v1/events`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventEnvelope {
    pub event: InboundEvent,
    #[serde(default)]
    pub chat: Option<ChatInfo>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub quoted: Option<QuotedMessage>,
    #[serde(default)]
    pub media: Option<MediaEnvelope>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaEnvelope {
    /// Base64-encoded bytes.
    pub data: String,
    pub mime_type: String,
    #[serde(default)]
    pub filename: Option<String>,
}

impl MediaEnvelope {
    pub fn decode(&self) -> Result<MediaPayload, MensageiroError> {
        let data = STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| MensageiroError::Validation(format!("media is not valid base64: {e}")))?;
        Ok(MediaPayload {
            data,
            mime_type: self.mime_type.clone(),
            filename: self.filename.clone(),
        })
    }
}

/// Body POSTed to the bridge for every outbound message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundRequest {
    pub target: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub is_recovered_message: bool,
}

/// Optional answer of the bridge to an outbound POST.
#[derive(Debug, Default, Deserialize)]
pub struct OutboundResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// Everything the envelope carried besides the event itself.
#[derive(Debug, Clone)]
pub struct EventExtras {
    pub chat: Option<ChatInfo>,
    pub mentions: Vec<String>,
    pub quoted: Option<QuotedMessage>,
    pub media: Option<MediaPayload>,
}

/// Event extras keyed by message id, dropped after the retention window.
#[derive(Debug)]
pub struct ExtrasStore {
    entries: DashMap<String, (Instant, EventExtras)>,
    retention: Duration,
}

impl ExtrasStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            retention,
        }
    }

    pub fn insert(&self, message_id: &str, extras: EventExtras) {
        self.prune();
        self.entries
            .insert(message_id.to_string(), (Instant::now(), extras));
    }

    pub fn get(&self, message_id: &str) -> Option<EventExtras> {
        let entry = self.entries.get(message_id)?;
        let (stored_at, extras) = entry.value();
        if stored_at.elapsed() > self.retention {
            return None;
        }
        Some(extras.clone())
    }

    pub fn prune(&self) -> usize {
        let before = self.entries.len();
        let retention = self.retention;
        self.entries
            .retain(|_, (stored_at, _)| stored_at.elapsed() <= retention);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extras() -> EventExtras {
        EventExtras {
            chat: None,
            mentions: vec!["bot@c.us".into()],
            quoted: None,
            media: None,
        }
    }

    #[test]
    fn envelope_parses_bridge_json() {
        let json = serde_json::json!({
            "event": {"id": "m1", "from": "123@g.us", "author": "55@c.us",
                      "body": "@bot oi", "type": "chat"},
            "chat": {"id": "123@g.us", "name": "Família", "is_group": true},
            "mentions": ["bot@c.us"],
            "media": {"data": "AQID", "mime_type": "image/jpeg"}
        });
        let envelope: EventEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(envelope.event.sender_id(), "55@c.us");
        assert!(envelope.chat.unwrap().is_group);
        let media = envelope.media.unwrap().decode().unwrap();
        assert_eq!(media.data, vec![1, 2, 3]);
    }

    #[test]
    fn bad_base64_is_validation_error() {
        let media = MediaEnvelope {
            data: "%%%".into(),
            mime_type: "image/jpeg".into(),
            filename: None,
        };
        assert!(matches!(media.decode(), Err(MensageiroError::Validation(_))));
    }

    #[test]
    fn extras_expire_after_retention() {
        let store = ExtrasStore::new(Duration::ZERO);
        store.insert("m1", extras());
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get("m1").is_none());
        assert_eq!(store.prune(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn extras_are_kept_within_retention() {
        let store = ExtrasStore::new(Duration::from_secs(60));
        store.insert("m1", extras());
        assert_eq!(store.get("m1").unwrap().mentions, vec!["bot@c.us"]);
        assert_eq!(store.len(), 1);
    }
}
