// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redelivery of responses that were produced but never delivered.
//!
//! [`RecoveryCoordinator::recover_pending`] runs once at startup;
//! [`RecoveryCoordinator::run`] then retries every transaction the store
//! signals after a failed delivery. Failures here are only logged.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mensageiro_core::{
    ChatPlatform, MensageiroError, OutboundMessage, SendOptions, Transaction, TransactionStatus,
    TransactionStore,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub attempted: usize,
    pub delivered: usize,
    /// Failed again but still has attempts left.
    pub failed: usize,
    /// Ran out of attempts and is now a permanent failure.
    pub abandoned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Delivered,
    Failed,
    Abandoned,
    /// Unknown, terminal, or missing a response or recovery data.
    Skipped,
}

pub struct RecoveryCoordinator {
    platform: Arc<dyn ChatPlatform>,
    transactions: Arc<dyn TransactionStore>,
    retry_delay: Duration,
}

impl RecoveryCoordinator {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        transactions: Arc<dyn TransactionStore>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            platform,
            transactions,
            retry_delay,
        }
    }

    /// Redelivers every recoverable transaction.
    pub async fn recover_pending(&self) -> Result<RecoveryReport, MensageiroError> {
        let pending = self.transactions.find_incomplete().await?;
        self.recover_all(pending).await
    }

    /// Redelivers only transactions whose last delivery failed. Responses in
    /// `response_ready` may still be in the dispatcher's hands.
    pub async fn recover_failed(&self) -> Result<RecoveryReport, MensageiroError> {
        let pending = self
            .transactions
            .find_incomplete()
            .await?
            .into_iter()
            .filter(|tx| tx.status == TransactionStatus::TempFailure)
            .collect();
        self.recover_all(pending).await
    }

    async fn recover_all(&self, pending: Vec<Transaction>) -> Result<RecoveryReport, MensageiroError> {
        let mut report = RecoveryReport::default();
        if pending.is_empty() {
            debug!("no transactions to recover");
            return Ok(report);
        }

        info!(count = pending.len(), "recovering undelivered responses");
        for transaction in pending {
            match self.recover(&transaction).await? {
                RecoveryOutcome::Delivered => report.delivered += 1,
                RecoveryOutcome::Failed => report.failed += 1,
                RecoveryOutcome::Abandoned => report.abandoned += 1,
                RecoveryOutcome::Skipped => continue,
            }
            report.attempted += 1;
        }

        info!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            abandoned = report.abandoned,
            "recovery pass finished"
        );
        Ok(report)
    }

    pub async fn recover_transaction(&self, id: &str) -> Result<RecoveryOutcome, MensageiroError> {
        match self.transactions.get(id).await? {
            Some(transaction) => self.recover(&transaction).await,
            None => {
                debug!(transaction_id = %id, "transaction no longer active");
                Ok(RecoveryOutcome::Skipped)
            }
        }
    }

    async fn recover(&self, transaction: &Transaction) -> Result<RecoveryOutcome, MensageiroError> {
        let id = transaction.id.as_str();
        let (Some(data), Some(response)) = (&transaction.recovery_data, &transaction.response) else {
            debug!(transaction_id = %id, "missing response or recovery data, not recoverable");
            return Ok(RecoveryOutcome::Skipped);
        };
        if !transaction.is_recoverable() {
            debug!(transaction_id = %id, status = %transaction.status, "not in a recoverable state");
            return Ok(RecoveryOutcome::Skipped);
        }

        let message = OutboundMessage {
            target: data.recipient_id.clone(),
            text: response.clone(),
            transaction_id: Some(id.to_string()),
            options: SendOptions {
                reply_to: None,
                is_recovered_message: true,
            },
        };

        match self.platform.send(message).await {
            Ok(_) => {
                self.transactions.mark_delivered(id).await?;
                info!(transaction_id = %id, recipient = %data.recipient_id, "recovered response delivered");
                Ok(RecoveryOutcome::Delivered)
            }
            Err(e) => {
                self.transactions
                    .record_delivery_failure(id, &e.to_string())
                    .await?;
                let status = self.transactions.get(id).await?.map(|t| t.status);
                if status == Some(TransactionStatus::PermanentFailure) {
                    error!(transaction_id = %id, error = %e, "recovery gave up, transaction abandoned");
                    Ok(RecoveryOutcome::Abandoned)
                } else {
                    warn!(transaction_id = %id, error = %e, "recovery delivery failed, will retry");
                    Ok(RecoveryOutcome::Failed)
                }
            }
        }
    }

    /// Retries signalled transactions after the retry delay until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut signals = self.transactions.subscribe();
        info!(retry_delay = ?self.retry_delay, "recovery coordinator running");

        loop {
            let signal = tokio::select! {
                signal = signals.recv() => signal,
                _ = cancel.cancelled() => break,
            };

            match signal {
                Ok(signal) => {
                    let coordinator = Arc::clone(&self);
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = tokio::time::sleep(coordinator.retry_delay) => {}
                            _ = cancel.cancelled() => return,
                        }
                        if let Err(e) = coordinator.recover_transaction(&signal.transaction_id).await {
                            error!(transaction_id = %signal.transaction_id, error = %e, "recovery attempt failed");
                        }
                    });
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "recovery signals dropped, retrying failed deliveries");
                    if let Err(e) = self.recover_failed().await {
                        error!(error = %e, "recovery pass failed");
                    }
                }
                Err(RecvError::Closed) => {
                    debug!("transaction store closed its signal channel");
                    break;
                }
            }
        }
        info!("recovery coordinator stopped");
    }
}
