// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-chat configuration and named prompt storage.

use async_trait::async_trait;

use crate::error::MensageiroError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatConfig, NamedPrompt};

#[async_trait]
pub trait ConfigStore: PluginAdapter {
    /// Settings of a chat; defaults when nothing was stored.
    async fn get_config(&self, chat_id: &str) -> Result<ChatConfig, MensageiroError>;

    async fn set_config(&self, chat_id: &str, config: &ChatConfig) -> Result<(), MensageiroError>;

    /// Restores defaults and forgets the active prompt. Named prompts are kept.
    async fn reset_config(&self, chat_id: &str) -> Result<(), MensageiroError>;

    async fn get_prompt(
        &self,
        chat_id: &str,
        name: &str,
    ) -> Result<Option<NamedPrompt>, MensageiroError>;

    /// Prompts of a chat ordered by name.
    async fn list_prompts(&self, chat_id: &str) -> Result<Vec<NamedPrompt>, MensageiroError>;

    /// Creates or replaces a named prompt.
    async fn set_prompt(&self, chat_id: &str, prompt: &NamedPrompt) -> Result<(), MensageiroError>;

    /// Returns false when no prompt had that name. Deleting the active prompt
    /// also clears the selection.
    async fn delete_prompt(&self, chat_id: &str, name: &str) -> Result<bool, MensageiroError>;

    /// Returns false when the prompt does not exist.
    async fn set_active_prompt(&self, chat_id: &str, name: &str) -> Result<bool, MensageiroError>;

    async fn clear_active_prompt(&self, chat_id: &str) -> Result<(), MensageiroError>;

    /// Text of the active prompt, if one is selected and still exists.
    async fn active_prompt_text(&self, chat_id: &str) -> Result<Option<String>, MensageiroError> {
        let config = self.get_config(chat_id).await?;
        match config.active_prompt {
            Some(name) => Ok(self.get_prompt(chat_id, &name).await?.map(|p| p.text)),
            None => Ok(None),
        }
    }
}
