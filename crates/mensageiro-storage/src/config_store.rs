// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`ConfigStore`].

use async_trait::async_trait;

use mensageiro_core::{
    AdapterType, ChatConfig, ConfigStore, HealthStatus, MensageiroError, NamedPrompt,
    PluginAdapter,
};

use crate::database::Database;
use crate::queries::chat_config as queries;

pub struct SqliteConfigStore {
    db: Database,
}

impl SqliteConfigStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PluginAdapter for SqliteConfigStore {
    fn name(&self) -> &str {
        "sqlite-chat-config"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ConfigStore
    }

    async fn health_check(&self) -> Result<HealthStatus, MensageiroError> {
        match self.db.ping().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), MensageiroError> {
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn get_config(&self, chat_id: &str) -> Result<ChatConfig, MensageiroError> {
        Ok(queries::get_config(&self.db, chat_id)
            .await?
            .unwrap_or_default())
    }

    async fn set_config(&self, chat_id: &str, config: &ChatConfig) -> Result<(), MensageiroError> {
        queries::upsert_config(&self.db, chat_id, config).await
    }

    async fn reset_config(&self, chat_id: &str) -> Result<(), MensageiroError> {
        queries::delete_config(&self.db, chat_id).await
    }

    async fn get_prompt(
        &self,
        chat_id: &str,
        name: &str,
    ) -> Result<Option<NamedPrompt>, MensageiroError> {
        queries::get_prompt(&self.db, chat_id, name).await
    }

    async fn list_prompts(&self, chat_id: &str) -> Result<Vec<NamedPrompt>, MensageiroError> {
        queries::list_prompts(&self.db, chat_id).await
    }

    async fn set_prompt(&self, chat_id: &str, prompt: &NamedPrompt) -> Result<(), MensageiroError> {
        queries::upsert_prompt(&self.db, chat_id, prompt).await
    }

    async fn delete_prompt(&self, chat_id: &str, name: &str) -> Result<bool, MensageiroError> {
        queries::delete_prompt(&self.db, chat_id, name).await
    }

    async fn set_active_prompt(&self, chat_id: &str, name: &str) -> Result<bool, MensageiroError> {
        if queries::get_prompt(&self.db, chat_id, name).await?.is_none() {
            return Ok(false);
        }
        let mut config = self.get_config(chat_id).await?;
        config.active_prompt = Some(name.to_string());
        queries::upsert_config(&self.db, chat_id, &config).await?;
        Ok(true)
    }

    async fn clear_active_prompt(&self, chat_id: &str) -> Result<(), MensageiroError> {
        let mut config = self.get_config(chat_id).await?;
        if config.active_prompt.take().is_some() {
            queries::upsert_config(&self.db, chat_id, &config).await?;
        }
        Ok(())
    }
}
