// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable ledger of message-processing transactions.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::MensageiroError;
use crate::traits::adapter::PluginAdapter;
use crate::transaction::{RecoveryData, RecoverySignal, Transaction};
use crate::types::{ChatInfo, InboundEvent, MessageKind};

/// Lifecycle operations on transactions.
///
/// Mutators return the number of affected transactions (0 or 1). Zero means
/// the id is unknown, no longer active, or the transition is not allowed from
/// the current state. `Err` is reserved for storage failures.
#[async_trait]
pub trait TransactionStore: PluginAdapter {
    async fn create(
        &self,
        event: &InboundEvent,
        chat: &ChatInfo,
        kind: MessageKind,
    ) -> Result<Transaction, MensageiroError>;

    async fn attach_recovery_data(
        &self,
        id: &str,
        data: RecoveryData,
    ) -> Result<usize, MensageiroError>;

    async fn mark_processing(&self, id: &str) -> Result<usize, MensageiroError>;

    async fn attach_response(&self, id: &str, response: &str) -> Result<usize, MensageiroError>;

    /// Moves the transaction out of the active set.
    async fn mark_delivered(&self, id: &str) -> Result<usize, MensageiroError>;

    async fn record_delivery_failure(&self, id: &str, error: &str)
    -> Result<usize, MensageiroError>;

    async fn abandon(&self, id: &str, reason: &str) -> Result<usize, MensageiroError>;

    async fn get(&self, id: &str) -> Result<Option<Transaction>, MensageiroError>;

    /// Active transactions that can be redelivered.
    async fn find_incomplete(&self) -> Result<Vec<Transaction>, MensageiroError>;

    /// All active transactions, oldest first.
    async fn list_active(&self) -> Result<Vec<Transaction>, MensageiroError>;

    /// Signals for transactions left recoverable by a failed delivery.
    fn subscribe(&self) -> broadcast::Receiver<RecoverySignal>;
}
