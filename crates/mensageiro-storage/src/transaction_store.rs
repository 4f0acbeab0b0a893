// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`TransactionStore`].

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use mensageiro_core::{
    AdapterType, ChatInfo, HealthStatus, InboundEvent, MensageiroError, MessageKind,
    PluginAdapter, RecoveryData, RecoverySignal, Transaction, TransactionStatus, TransactionStore,
};

use crate::database::Database;
use crate::queries::transactions as queries;

const SIGNAL_CAPACITY: usize = 256;

/// A failed delivery that left the transaction redeliverable.
pub(crate) fn needs_recovery(tx: &Transaction) -> bool {
    tx.status == TransactionStatus::TempFailure && tx.is_recoverable()
}

pub struct SqliteTransactionStore {
    db: Database,
    max_attempts: u32,
    signals: broadcast::Sender<RecoverySignal>,
}

impl SqliteTransactionStore {
    pub fn new(db: Database, max_attempts: u32) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            db,
            max_attempts,
            signals,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn apply<F>(&self, id: &str, op: &'static str, f: F) -> Result<usize, MensageiroError>
    where
        F: FnOnce(&mut Transaction) -> bool + Send + 'static,
    {
        let (affected, _) = self.apply_returning(id, op, f).await?;
        Ok(affected)
    }

    async fn apply_returning<F>(
        &self,
        id: &str,
        op: &'static str,
        f: F,
    ) -> Result<(usize, Option<Transaction>), MensageiroError>
    where
        F: FnOnce(&mut Transaction) -> bool + Send + 'static,
    {
        let (affected, tx) = queries::update(&self.db, id, f).await?;
        match &tx {
            Some(tx) if affected == 1 => {
                debug!(transaction_id = %id, op, status = %tx.status, "transaction updated");
            }
            Some(tx) => {
                debug!(transaction_id = %id, op, status = %tx.status, "transition not allowed");
            }
            None => debug!(transaction_id = %id, op, "transaction not active"),
        }
        Ok((affected, tx))
    }
}

#[async_trait]
impl PluginAdapter for SqliteTransactionStore {
    fn name(&self) -> &str {
        "sqlite-transactions"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::TransactionStore
    }

    async fn health_check(&self) -> Result<HealthStatus, MensageiroError> {
        match self.db.ping().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), MensageiroError> {
        self.db.checkpoint().await?;
        debug!("transaction store checkpointed");
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for SqliteTransactionStore {
    async fn create(
        &self,
        event: &InboundEvent,
        chat: &ChatInfo,
        kind: MessageKind,
    ) -> Result<Transaction, MensageiroError> {
        let tx = Transaction::new(event, chat, kind);
        queries::insert(&self.db, &tx).await?;
        debug!(transaction_id = %tx.id, message_id = %tx.message_id, %kind, "transaction created");
        Ok(tx)
    }

    async fn attach_recovery_data(
        &self,
        id: &str,
        data: RecoveryData,
    ) -> Result<usize, MensageiroError> {
        self.apply(id, "attach_recovery_data", move |tx| {
            tx.attach_recovery_data(data)
        })
        .await
    }

    async fn mark_processing(&self, id: &str) -> Result<usize, MensageiroError> {
        self.apply(id, "mark_processing", |tx| tx.mark_processing())
            .await
    }

    async fn attach_response(&self, id: &str, response: &str) -> Result<usize, MensageiroError> {
        let response = response.to_string();
        self.apply(id, "attach_response", move |tx| tx.attach_response(response))
            .await
    }

    async fn mark_delivered(&self, id: &str) -> Result<usize, MensageiroError> {
        self.apply(id, "mark_delivered", |tx| tx.mark_delivered())
            .await
    }

    async fn record_delivery_failure(
        &self,
        id: &str,
        error: &str,
    ) -> Result<usize, MensageiroError> {
        let error = error.to_string();
        let max_attempts = self.max_attempts;
        let (affected, tx) = self
            .apply_returning(id, "record_delivery_failure", move |tx| {
                tx.record_delivery_failure(&error, max_attempts)
            })
            .await?;

        if let (1, Some(tx)) = (affected, tx) {
            if tx.status == TransactionStatus::PermanentFailure {
                warn!(
                    transaction_id = %tx.id,
                    attempts = tx.attempts,
                    error = tx.last_error.as_deref().unwrap_or_default(),
                    "transaction permanently failed"
                );
            } else if needs_recovery(&tx) {
                // No subscribers is fine: startup recovery will pick it up.
                let _ = self.signals.send(RecoverySignal {
                    transaction_id: tx.id.clone(),
                });
            }
        }
        Ok(affected)
    }

    async fn abandon(&self, id: &str, reason: &str) -> Result<usize, MensageiroError> {
        let reason = reason.to_string();
        self.apply(id, "abandon", move |tx| tx.abandon(&reason)).await
    }

    async fn get(&self, id: &str) -> Result<Option<Transaction>, MensageiroError> {
        queries::get(&self.db, id).await
    }

    async fn find_incomplete(&self) -> Result<Vec<Transaction>, MensageiroError> {
        let candidates = queries::list_recovery_candidates(&self.db).await?;
        Ok(candidates
            .into_iter()
            .filter(Transaction::is_recoverable)
            .collect())
    }

    async fn list_active(&self) -> Result<Vec<Transaction>, MensageiroError> {
        queries::list_active(&self.db).await
    }

    fn subscribe(&self) -> broadcast::Receiver<RecoverySignal> {
        self.signals.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mensageiro_core::EventKind;
    use tempfile::tempdir;

    fn event(id: &str) -> InboundEvent {
        InboundEvent {
            id: id.into(),
            from: "5511@c.us".into(),
            author: None,
            body: "Olá, como você está?".into(),
            has_media: false,
            kind: EventKind::Chat,
            has_quoted_msg: false,
            timestamp: 1_700_000_000,
        }
    }

    fn chat() -> ChatInfo {
        ChatInfo {
            id: "5511@c.us".into(),
            name: None,
            is_group: false,
        }
    }

    fn recovery() -> RecoveryData {
        RecoveryData {
            recipient_id: "5511@c.us".into(),
            chat_id: "5511@c.us".into(),
        }
    }

    async fn store() -> SqliteTransactionStore {
        SqliteTransactionStore::new(Database::open_in_memory().await.unwrap(), 3)
    }

    #[tokio::test]
    async fn lifecycle_archives_delivered_transaction() {
        let store = store().await;
        let tx = store.create(&event("m1"), &chat(), MessageKind::Text).await.unwrap();
        assert_eq!(store.attach_recovery_data(&tx.id, recovery()).await.unwrap(), 1);
        assert_eq!(store.mark_processing(&tx.id).await.unwrap(), 1);
        assert_eq!(store.attach_response(&tx.id, "Tudo bem!").await.unwrap(), 1);

        let loaded = store.get(&tx.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TransactionStatus::ResponseReady);
        assert_eq!(loaded.response.as_deref(), Some("Tudo bem!"));
        assert_eq!(loaded.recovery_data, Some(recovery()));
        assert_eq!(loaded.history.len(), 4);

        assert_eq!(store.mark_delivered(&tx.id).await.unwrap(), 1);
        assert!(store.get(&tx.id).await.unwrap().is_none());
        assert!(queries::is_archived(store.database(), &tx.id).await.unwrap());
        let history = queries::history(store.database(), &tx.id).await.unwrap();
        assert_eq!(history.last().unwrap().status, TransactionStatus::Delivered);

        assert_eq!(store.mark_delivered(&tx.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_id_affects_nothing() {
        let store = store().await;
        assert_eq!(store.attach_recovery_data("nope", recovery()).await.unwrap(), 0);
        assert_eq!(store.mark_processing("nope").await.unwrap(), 0);
        assert_eq!(store.record_delivery_failure("nope", "x").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn third_failure_is_permanent_and_no_fourth_attempt_is_recorded() {
        let store = store().await;
        let tx = store.create(&event("m2"), &chat(), MessageKind::Text).await.unwrap();
        for expected in [TransactionStatus::TempFailure, TransactionStatus::TempFailure] {
            assert_eq!(store.record_delivery_failure(&tx.id, "offline").await.unwrap(), 1);
            assert_eq!(store.get(&tx.id).await.unwrap().unwrap().status, expected);
        }
        assert_eq!(store.record_delivery_failure(&tx.id, "offline").await.unwrap(), 1);
        assert_eq!(store.record_delivery_failure(&tx.id, "offline").await.unwrap(), 0);

        let loaded = store.get(&tx.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TransactionStatus::PermanentFailure);
        assert_eq!(loaded.attempts, 3);
        assert_eq!(loaded.last_error.as_deref(), Some("offline"));
    }

    #[tokio::test]
    async fn find_incomplete_requires_response_and_recovery_data() {
        let store = store().await;
        let with_all = store.create(&event("a"), &chat(), MessageKind::Text).await.unwrap();
        store.attach_recovery_data(&with_all.id, recovery()).await.unwrap();
        store.mark_processing(&with_all.id).await.unwrap();
        store.attach_response(&with_all.id, "ok").await.unwrap();

        let no_recovery = store.create(&event("b"), &chat(), MessageKind::Text).await.unwrap();
        store.mark_processing(&no_recovery.id).await.unwrap();
        store.attach_response(&no_recovery.id, "ok").await.unwrap();

        let no_response = store.create(&event("c"), &chat(), MessageKind::Image).await.unwrap();
        store.attach_recovery_data(&no_response.id, recovery()).await.unwrap();
        store.mark_processing(&no_response.id).await.unwrap();

        let found = store.find_incomplete().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, with_all.id);
        assert_eq!(store.list_active().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn recoverable_failure_emits_signal() {
        let store = store().await;
        let mut signals = store.subscribe();
        let tx = store.create(&event("s"), &chat(), MessageKind::Text).await.unwrap();
        store.attach_recovery_data(&tx.id, recovery()).await.unwrap();
        store.mark_processing(&tx.id).await.unwrap();
        store.attach_response(&tx.id, "resposta").await.unwrap();

        store.record_delivery_failure(&tx.id, "send failed").await.unwrap();
        let signal = signals.try_recv().unwrap();
        assert_eq!(signal.transaction_id, tx.id);
    }

    #[tokio::test]
    async fn failure_without_response_emits_no_signal() {
        let store = store().await;
        let mut signals = store.subscribe();
        let tx = store.create(&event("n"), &chat(), MessageKind::Text).await.unwrap();
        store.record_delivery_failure(&tx.id, "ai failed").await.unwrap();
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempdir().unwrap();
        let config = mensageiro_config::model::StorageConfig {
            database_path: dir.path().join("tx.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        let id = {
            let store = SqliteTransactionStore::new(Database::open(&config).await.unwrap(), 3);
            let tx = store.create(&event("r"), &chat(), MessageKind::Audio).await.unwrap();
            store.attach_recovery_data(&tx.id, recovery()).await.unwrap();
            store.mark_processing(&tx.id).await.unwrap();
            store.attach_response(&tx.id, "transcrição").await.unwrap();
            store.shutdown().await.unwrap();
            tx.id
        };

        let store = SqliteTransactionStore::new(Database::open(&config).await.unwrap(), 3);
        let found = store.find_incomplete().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
        assert_eq!(found[0].kind, MessageKind::Audio);
    }

    #[tokio::test]
    async fn abandon_moves_to_permanent_failure() {
        let store = store().await;
        let tx = store.create(&event("big"), &chat(), MessageKind::Video).await.unwrap();
        assert_eq!(store.abandon(&tx.id, "media too large").await.unwrap(), 1);
        assert_eq!(store.mark_processing(&tx.id).await.unwrap(), 0);
        let loaded = store.get(&tx.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TransactionStatus::PermanentFailure);
    }

    #[tokio::test]
    async fn adapter_identity_and_health() {
        let store = store().await;
        assert_eq!(store.name(), "sqlite-transactions");
        assert_eq!(store.adapter_type(), AdapterType::TransactionStore);
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
