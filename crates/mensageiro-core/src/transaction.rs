// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transaction record and its lifecycle transitions.
//!
//! The transition methods are pure: every store implementation loads a
//! [`Transaction`], applies one of them, and persists the result only when the
//! method reports a change. This keeps the in-memory and SQLite stores
//! behaviourally identical.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::types::{ChatInfo, InboundEvent, MessageKind};

/// Default number of delivery attempts before a transaction is abandoned.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Lifecycle state of a transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
    Created,
    Processing,
    ResponseReady,
    Delivered,
    TempFailure,
    PermanentFailure,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Delivered | TransactionStatus::PermanentFailure
        )
    }
}

/// One entry of the append-only transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
    pub detail: String,
}

/// Where a response has to go when it is redelivered after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryData {
    pub recipient_id: String,
    pub chat_id: String,
}

/// Emitted by a store when a failed delivery left a transaction recoverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverySignal {
    pub transaction_id: String,
}

/// A message-processing attempt tracked from reception to delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub message_id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub kind: MessageKind,
    pub status: TransactionStatus,
    pub attempts: u32,
    pub history: Vec<HistoryEntry>,
    pub recovery_data: Option<RecoveryData>,
    pub response: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Transaction {
    /// Starts a transaction for an inbound event.
    pub fn new(event: &InboundEvent, chat: &ChatInfo, kind: MessageKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            message_id: event.id.clone(),
            chat_id: chat.id.clone(),
            sender_id: event.sender_id().to_string(),
            kind,
            status: TransactionStatus::Created,
            attempts: 0,
            history: vec![HistoryEntry {
                timestamp: now,
                status: TransactionStatus::Created,
                detail: format!("{kind} message received"),
            }],
            recovery_data: None,
            response: None,
            last_error: None,
            created_at: now,
            last_updated: now,
        }
    }

    /// Processing, response_ready or temp_failure, with a response and a recipient.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.status,
            TransactionStatus::Processing
                | TransactionStatus::ResponseReady
                | TransactionStatus::TempFailure
        ) && self.response.is_some()
            && self.recovery_data.is_some()
    }

    fn record(&mut self, status: TransactionStatus, detail: impl Into<String>) {
        let now = Utc::now();
        self.status = status;
        self.last_updated = now;
        self.history.push(HistoryEntry {
            timestamp: now,
            status,
            detail: detail.into(),
        });
    }

    /// Merges recovery data. Re-attaching the same data changes nothing.
    pub fn attach_recovery_data(&mut self, data: RecoveryData) -> bool {
        if self.recovery_data.as_ref() == Some(&data) {
            return true;
        }
        let detail = format!("recovery data attached for {}", data.recipient_id);
        self.recovery_data = Some(data);
        self.record(self.status, detail);
        true
    }

    /// `created | temp_failure -> processing`.
    pub fn mark_processing(&mut self) -> bool {
        match self.status {
            TransactionStatus::Created | TransactionStatus::TempFailure => {
                self.record(TransactionStatus::Processing, "processing started");
                true
            }
            _ => false,
        }
    }

    /// Stores the response and moves to `response_ready`.
    pub fn attach_response(&mut self, response: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.response = Some(response.into());
        self.record(TransactionStatus::ResponseReady, "response attached");
        true
    }

    pub fn mark_delivered(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.record(TransactionStatus::Delivered, "response delivered");
        true
    }

    /// Counts a failed attempt, then decides between retry and abandonment.
    pub fn record_delivery_failure(&mut self, error: &str, max_attempts: u32) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.attempts += 1;
        self.last_error = Some(error.to_string());
        let next = if self.attempts < max_attempts {
            TransactionStatus::TempFailure
        } else {
            TransactionStatus::PermanentFailure
        };
        let detail = format!("attempt {}/{max_attempts} failed: {error}", self.attempts);
        self.record(next, detail);
        true
    }

    /// Moves a live transaction straight to `permanent_failure`.
    pub fn abandon(&mut self, reason: &str) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.last_error = Some(reason.to_string());
        self.record(
            TransactionStatus::PermanentFailure,
            format!("abandoned: {reason}"),
        );
        true
    }
}
