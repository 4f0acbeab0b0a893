// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory stores for tests and single-run deployments.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};

use mensageiro_core::{
    AdapterType, ChatConfig, ChatInfo, ConfigStore, HealthStatus, InboundEvent, MensageiroError,
    MessageKind, NamedPrompt, PluginAdapter, RecoveryData, RecoverySignal, Transaction,
    TransactionStatus, TransactionStore,
};

use crate::transaction_store::needs_recovery;

#[derive(Default)]
struct Ledger {
    active: HashMap<String, Transaction>,
    delivered: HashMap<String, Transaction>,
}

/// Transaction ledger kept in process memory. Lost on restart.
pub struct MemoryTransactionStore {
    ledger: Mutex<Ledger>,
    max_attempts: u32,
    signals: broadcast::Sender<RecoverySignal>,
}

impl MemoryTransactionStore {
    pub fn new(max_attempts: u32) -> Self {
        let (signals, _) = broadcast::channel(256);
        Self {
            ledger: Mutex::new(Ledger::default()),
            max_attempts,
            signals,
        }
    }

    /// Delivered transaction, if it was archived.
    pub async fn delivered(&self, id: &str) -> Option<Transaction> {
        self.ledger.lock().await.delivered.get(id).cloned()
    }

    /// Stores a transaction exactly as given, replacing any active one with
    /// the same id. Used to seed a ledger, for example with the state a crash
    /// left behind.
    pub async fn insert_raw(&self, transaction: Transaction) {
        self.ledger
            .lock()
            .await
            .active
            .insert(transaction.id.clone(), transaction);
    }

    /// Number of transactions ever created.
    pub async fn total_count(&self) -> usize {
        let ledger = self.ledger.lock().await;
        ledger.active.len() + ledger.delivered.len()
    }

    async fn apply<F>(&self, id: &str, f: F) -> (usize, Option<Transaction>)
    where
        F: FnOnce(&mut Transaction) -> bool,
    {
        let mut ledger = self.ledger.lock().await;
        let Some(tx) = ledger.active.get_mut(id) else {
            return (0, None);
        };
        if !f(tx) {
            return (0, Some(tx.clone()));
        }
        let snapshot = tx.clone();
        if snapshot.status == TransactionStatus::Delivered {
            ledger.active.remove(id);
            ledger.delivered.insert(id.to_string(), snapshot.clone());
        }
        (1, Some(snapshot))
    }
}

impl Default for MemoryTransactionStore {
    fn default() -> Self {
        Self::new(mensageiro_core::DEFAULT_MAX_ATTEMPTS)
    }
}

#[async_trait]
impl PluginAdapter for MemoryTransactionStore {
    fn name(&self) -> &str {
        "memory-transactions"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::TransactionStore
    }

    async fn health_check(&self) -> Result<HealthStatus, MensageiroError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MensageiroError> {
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn create(
        &self,
        event: &InboundEvent,
        chat: &ChatInfo,
        kind: MessageKind,
    ) -> Result<Transaction, MensageiroError> {
        let tx = Transaction::new(event, chat, kind);
        self.ledger
            .lock()
            .await
            .active
            .insert(tx.id.clone(), tx.clone());
        debug!(transaction_id = %tx.id, message_id = %tx.message_id, %kind, "transaction created");
        Ok(tx)
    }

    async fn attach_recovery_data(
        &self,
        id: &str,
        data: RecoveryData,
    ) -> Result<usize, MensageiroError> {
        Ok(self.apply(id, |tx| tx.attach_recovery_data(data)).await.0)
    }

    async fn mark_processing(&self, id: &str) -> Result<usize, MensageiroError> {
        Ok(self.apply(id, |tx| tx.mark_processing()).await.0)
    }

    async fn attach_response(&self, id: &str, response: &str) -> Result<usize, MensageiroError> {
        Ok(self.apply(id, |tx| tx.attach_response(response)).await.0)
    }

    async fn mark_delivered(&self, id: &str) -> Result<usize, MensageiroError> {
        Ok(self.apply(id, |tx| tx.mark_delivered()).await.0)
    }

    async fn record_delivery_failure(
        &self,
        id: &str,
        error: &str,
    ) -> Result<usize, MensageiroError> {
        let max_attempts = self.max_attempts;
        let (affected, tx) = self
            .apply(id, |tx| tx.record_delivery_failure(error, max_attempts))
            .await;
        if let (1, Some(tx)) = (affected, tx) {
            if tx.status == TransactionStatus::PermanentFailure {
                warn!(transaction_id = %tx.id, attempts = tx.attempts, "transaction permanently failed");
            } else if needs_recovery(&tx) {
                let _ = self.signals.send(RecoverySignal {
                    transaction_id: tx.id,
                });
            }
        }
        Ok(affected)
    }

    async fn abandon(&self, id: &str, reason: &str) -> Result<usize, MensageiroError> {
        Ok(self.apply(id, |tx| tx.abandon(reason)).await.0)
    }

    async fn get(&self, id: &str) -> Result<Option<Transaction>, MensageiroError> {
        Ok(self.ledger.lock().await.active.get(id).cloned())
    }

    async fn find_incomplete(&self) -> Result<Vec<Transaction>, MensageiroError> {
        Ok(self
            .list_active()
            .await?
            .into_iter()
            .filter(Transaction::is_recoverable)
            .collect())
    }

    async fn list_active(&self) -> Result<Vec<Transaction>, MensageiroError> {
        let mut all: Vec<_> = self.ledger.lock().await.active.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    fn subscribe(&self) -> broadcast::Receiver<RecoverySignal> {
        self.signals.subscribe()
    }
}

#[derive(Default)]
struct ChatState {
    config: Option<ChatConfig>,
    prompts: BTreeMap<String, String>,
}

/// Per-chat settings kept in process memory.
#[derive(Default)]
pub struct MemoryConfigStore {
    chats: Mutex<HashMap<String, ChatState>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginAdapter for MemoryConfigStore {
    fn name(&self) -> &str {
        "memory-chat-config"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ConfigStore
    }

    async fn health_check(&self) -> Result<HealthStatus, MensageiroError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MensageiroError> {
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get_config(&self, chat_id: &str) -> Result<ChatConfig, MensageiroError> {
        Ok(self
            .chats
            .lock()
            .await
            .get(chat_id)
            .and_then(|c| c.config.clone())
            .unwrap_or_default())
    }

    async fn set_config(&self, chat_id: &str, config: &ChatConfig) -> Result<(), MensageiroError> {
        self.chats
            .lock()
            .await
            .entry(chat_id.to_string())
            .or_default()
            .config = Some(config.clone());
        Ok(())
    }

    async fn reset_config(&self, chat_id: &str) -> Result<(), MensageiroError> {
        if let Some(state) = self.chats.lock().await.get_mut(chat_id) {
            state.config = None;
        }
        Ok(())
    }

    async fn get_prompt(
        &self,
        chat_id: &str,
        name: &str,
    ) -> Result<Option<NamedPrompt>, MensageiroError> {
        Ok(self.chats.lock().await.get(chat_id).and_then(|c| {
            c.prompts.get(name).map(|text| NamedPrompt {
                name: name.to_string(),
                text: text.clone(),
            })
        }))
    }

    async fn list_prompts(&self, chat_id: &str) -> Result<Vec<NamedPrompt>, MensageiroError> {
        Ok(self
            .chats
            .lock()
            .await
            .get(chat_id)
            .map(|c| {
                c.prompts
                    .iter()
                    .map(|(name, text)| NamedPrompt {
                        name: name.clone(),
                        text: text.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn set_prompt(&self, chat_id: &str, prompt: &NamedPrompt) -> Result<(), MensageiroError> {
        self.chats
            .lock()
            .await
            .entry(chat_id.to_string())
            .or_default()
            .prompts
            .insert(prompt.name.clone(), prompt.text.clone());
        Ok(())
    }

    async fn delete_prompt(&self, chat_id: &str, name: &str) -> Result<bool, MensageiroError> {
        let mut chats = self.chats.lock().await;
        let Some(state) = chats.get_mut(chat_id) else {
            return Ok(false);
        };
        let removed = state.prompts.remove(name).is_some();
        if let Some(config) = state.config.as_mut() {
            if config.active_prompt.as_deref() == Some(name) {
                config.active_prompt = None;
            }
        }
        Ok(removed)
    }

    async fn set_active_prompt(&self, chat_id: &str, name: &str) -> Result<bool, MensageiroError> {
        let mut chats = self.chats.lock().await;
        let state = chats.entry(chat_id.to_string()).or_default();
        if !state.prompts.contains_key(name) {
            return Ok(false);
        }
        state.config.get_or_insert_with(ChatConfig::default).active_prompt = Some(name.to_string());
        Ok(true)
    }

    async fn clear_active_prompt(&self, chat_id: &str) -> Result<(), MensageiroError> {
        if let Some(config) = self
            .chats
            .lock()
            .await
            .get_mut(chat_id)
            .and_then(|c| c.config.as_mut())
        {
            config.active_prompt = None;
        }
        Ok(())
    }
}
