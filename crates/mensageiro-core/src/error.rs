// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Mensageiro message engine.

use std::time::Duration;

use thiserror::Error;

use crate::types::MessageKind;

/// Marker the AI backends put in error content when a request was refused
/// by the provider's content-safety policy.
pub const SAFETY_MARKER: &str = "SAFETY";

/// The primary error type used across all Mensageiro adapter traits and core operations.
#[derive(Debug, Error)]
pub enum MensageiroError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Inbound event is malformed (missing id or chat reference).
    #[error("invalid event: {0}")]
    Validation(String),

    /// The message id was already processed.
    #[error("duplicate message {message_id}")]
    DuplicateMessage { message_id: String },

    /// The detected media kind is disabled for the chat.
    #[error("{kind} processing is disabled for chat {chat_id}")]
    FeatureDisabled { kind: MessageKind, chat_id: String },

    /// Media payload exceeds the configured ceiling.
    #[error("media of {size_bytes} bytes exceeds the {limit_bytes} byte limit")]
    MediaTooLarge { size_bytes: u64, limit_bytes: u64 },

    /// Generic AI backend failure.
    #[error("AI backend error: {message}")]
    AiBackend {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The AI backend refused the request on content-safety grounds.
    #[error("blocked by safety policy: {message}")]
    SafetyBlocked { message: String },

    /// A protected call path is short-circuited by an open circuit breaker.
    #[error("service unavailable: {component}")]
    ServiceUnavailable { component: String },

    /// The media queue rejected a submission.
    #[error("queue unavailable: {message}")]
    QueueUnavailable { message: String },

    /// A job for this transaction is already in flight.
    #[error("transaction {transaction_id} already has a job in flight")]
    DuplicateSubmission { transaction_id: String },

    /// Outbound delivery failed.
    #[error("delivery error: {message}")]
    Delivery {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MensageiroError {
    /// Builds an AI backend error from raw error content, promoting it to
    /// [`MensageiroError::SafetyBlocked`] when the content carries the safety marker.
    pub fn from_backend_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.to_ascii_uppercase().contains(SAFETY_MARKER) {
            MensageiroError::SafetyBlocked { message }
        } else {
            MensageiroError::AiBackend {
                message,
                source: None,
            }
        }
    }

    /// Returns true for the content-safety refusal.
    pub fn is_safety_blocked(&self) -> bool {
        matches!(self, MensageiroError::SafetyBlocked { .. })
    }

    /// Shorthand for a storage error with a plain message.
    pub fn storage(message: impl Into<String>) -> Self {
        MensageiroError::Storage {
            source: message.into().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_message_with_marker_is_safety_blocked() {
        let err = MensageiroError::from_backend_message("candidate blocked: finishReason=SAFETY");
        assert!(err.is_safety_blocked());
    }

    #[test]
    fn marker_match_ignores_case() {
        let err = MensageiroError::from_backend_message("response blocked due to safety");
        assert!(err.is_safety_blocked());
    }

    #[test]
    fn backend_message_without_marker_is_generic() {
        let err = MensageiroError::from_backend_message("503 service overloaded");
        assert!(matches!(err, MensageiroError::AiBackend { .. }));
        assert_eq!(err.to_string(), "AI backend error: 503 service overloaded");
    }

    #[test]
    fn media_too_large_display_mentions_sizes() {
        let err = MensageiroError::MediaTooLarge {
            size_bytes: 30,
            limit_bytes: 20,
        };
        assert_eq!(
            err.to_string(),
            "media of 30 bytes exceeds the 20 byte limit"
        );
    }
}
