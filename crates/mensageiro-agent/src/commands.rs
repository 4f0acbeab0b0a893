// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat commands. They act on the config store only and never create a
//! transaction.

use std::sync::Arc;

use mensageiro_core::{
    CHAT_CONFIG_KEYS, ChatConfig, ConfigStore, DescriptionMode, MensageiroError, NamedPrompt,
};

use crate::classify::ParsedCommand;
use crate::replies;

/// Reply to a command, and whether the command was known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub text: String,
    pub recognized: bool,
}

impl CommandReply {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            recognized: true,
        }
    }
}

pub struct CommandHandler {
    store: Arc<dyn ConfigStore>,
    prefix: String,
}

impl CommandHandler {
    pub fn new(store: Arc<dyn ConfigStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub async fn handle(
        &self,
        chat_id: &str,
        command: &ParsedCommand,
    ) -> Result<CommandReply, MensageiroError> {
        tracing::debug!(chat_id, command = %command.name, "handling command");
        match command.name.as_str() {
            "ajuda" => Ok(CommandReply::ok(replies::help(&self.prefix))),
            "reset" => {
                self.store.reset_config(chat_id).await?;
                Ok(CommandReply::ok("Configurações do chat restauradas."))
            }
            "prompt" => self.prompt(chat_id, &command.args).await,
            "config" => self.config(chat_id, &command.args).await,
            "audio" => self.toggle(chat_id, "áudio", |c| &mut c.media_audio).await,
            "video" => self.toggle(chat_id, "vídeo", |c| &mut c.media_video).await,
            "imagem" => self.toggle(chat_id, "imagem", |c| &mut c.media_image).await,
            "longo" => self.set_mode(chat_id, DescriptionMode::Long).await,
            "curto" => self.set_mode(chat_id, DescriptionMode::Short).await,
            "cego" => self.accessibility(chat_id).await,
            other => Ok(CommandReply {
                text: replies::unknown_command(&self.prefix, other),
                recognized: false,
            }),
        }
    }

    async fn prompt(&self, chat_id: &str, args: &str) -> Result<CommandReply, MensageiroError> {
        let (action, rest) = ParsedCommand::split_first_arg(args);
        let (name, text) = ParsedCommand::split_first_arg(&rest);

        let reply = match action.as_str() {
            "set" if !name.is_empty() && !text.is_empty() => {
                self.store
                    .set_prompt(chat_id, &NamedPrompt { name: name.clone(), text })
                    .await?;
                format!("Prompt '{name}' salvo.")
            }
            "get" if !name.is_empty() => match self.store.get_prompt(chat_id, &name).await? {
                Some(prompt) => format!("Prompt '{}':\n{}", prompt.name, prompt.text),
                None => format!("Prompt '{name}' não encontrado."),
            },
            "list" => {
                let prompts = self.store.list_prompts(chat_id).await?;
                if prompts.is_empty() {
                    "Nenhum prompt salvo.".to_string()
                } else {
                    let active = self.store.get_config(chat_id).await?.active_prompt;
                    let lines: Vec<String> = prompts
                        .iter()
                        .map(|p| {
                            if active.as_deref() == Some(p.name.as_str()) {
                                format!("* {} (ativo)", p.name)
                            } else {
                                format!("- {}", p.name)
                            }
                        })
                        .collect();
                    format!("Prompts salvos:\n{}", lines.join("\n"))
                }
            }
            "delete" if !name.is_empty() => {
                if self.store.delete_prompt(chat_id, &name).await? {
                    format!("Prompt '{name}' apagado.")
                } else {
                    format!("Prompt '{name}' não encontrado.")
                }
            }
            "usar" if !name.is_empty() => {
                if self.store.set_active_prompt(chat_id, &name).await? {
                    format!("Prompt '{name}' ativado.")
                } else {
                    format!("Prompt '{name}' não encontrado.")
                }
            }
            "limpar" => {
                self.store.clear_active_prompt(chat_id).await?;
                "Prompt ativo removido.".to_string()
            }
            _ => replies::usage(
                &self.prefix,
                "prompt set <nome> <texto> | get <nome> | list | delete <nome> | usar <nome> | limpar",
            ),
        };
        Ok(CommandReply::ok(reply))
    }

    async fn config(&self, chat_id: &str, args: &str) -> Result<CommandReply, MensageiroError> {
        let (action, rest) = ParsedCommand::split_first_arg(args);
        let (key, value) = ParsedCommand::split_first_arg(&rest);
        let mut config = self.store.get_config(chat_id).await?;

        let reply = match action.as_str() {
            "get" if key.is_empty() => render_config(&config),
            "get" => match config.get(&key) {
                Some(value) => format!("{key} = {value}"),
                None => unknown_key(&key),
            },
            "set" if !key.is_empty() && !value.is_empty() => match config.set(&key, &value) {
                Ok(()) => {
                    self.store.set_config(chat_id, &config).await?;
                    format!("{key} = {}", config.get(&key).unwrap_or(value))
                }
                Err(MensageiroError::Validation(msg)) if CHAT_CONFIG_KEYS.contains(&key.as_str()) => {
                    format!("Valor inválido: {msg}")
                }
                Err(MensageiroError::Validation(_)) => unknown_key(&key),
                Err(e) => return Err(e),
            },
            _ => replies::usage(&self.prefix, "config get [chave] | config set <chave> <valor>"),
        };
        Ok(CommandReply::ok(reply))
    }

    async fn toggle(
        &self,
        chat_id: &str,
        label: &str,
        field: fn(&mut ChatConfig) -> &mut bool,
    ) -> Result<CommandReply, MensageiroError> {
        let mut config = self.store.get_config(chat_id).await?;
        let flag = field(&mut config);
        *flag = !*flag;
        let enabled = *flag;
        self.store.set_config(chat_id, &config).await?;
        Ok(CommandReply::ok(replies::toggle(label, enabled)))
    }

    async fn set_mode(
        &self,
        chat_id: &str,
        mode: DescriptionMode,
    ) -> Result<CommandReply, MensageiroError> {
        let mut config = self.store.get_config(chat_id).await?;
        config.description_mode = mode;
        self.store.set_config(chat_id, &config).await?;
        Ok(CommandReply::ok(match mode {
            DescriptionMode::Long => "Descrições longas ativadas.",
            DescriptionMode::Short => "Descrições curtas ativadas.",
        }))
    }

    /// Images on, long descriptions, accessibility prompt active.
    async fn accessibility(&self, chat_id: &str) -> Result<CommandReply, MensageiroError> {
        let mut config = self.store.get_config(chat_id).await?;
        config.media_image = true;
        config.description_mode = DescriptionMode::Long;
        self.store.set_config(chat_id, &config).await?;
        self.store
            .set_prompt(
                chat_id,
                &NamedPrompt {
                    name: replies::ACCESSIBILITY_PROMPT_NAME.to_string(),
                    text: replies::ACCESSIBILITY_PROMPT.to_string(),
                },
            )
            .await?;
        self.store
            .set_active_prompt(chat_id, replies::ACCESSIBILITY_PROMPT_NAME)
            .await?;
        Ok(CommandReply::ok(
            "Modo de acessibilidade ativado: imagens ligadas, descrições longas e prompt 'cego' ativo.",
        ))
    }
}

fn render_config(config: &ChatConfig) -> String {
    let mut lines: Vec<String> = config
        .entries()
        .into_iter()
        .map(|(key, value)| format!("{key} = {value}"))
        .collect();
    lines.push(format!(
        "active_prompt = {}",
        config.active_prompt.as_deref().unwrap_or("(nenhum)")
    ));
    lines.join("\n")
}

fn unknown_key(key: &str) -> String {
    format!(
        "Chave desconhecida: {key}. Chaves válidas: {}",
        CHAT_CONFIG_KEYS.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::parse_command;
    use mensageiro_storage::MemoryConfigStore;

    fn handler() -> (CommandHandler, Arc<MemoryConfigStore>) {
        let store = Arc::new(MemoryConfigStore::default());
        (CommandHandler::new(store.clone(), "."), store)
    }

    async fn run(handler: &CommandHandler, line: &str) -> CommandReply {
        let command = parse_command(line, ".").unwrap();
        handler.handle("chat-1", &command).await.unwrap()
    }

    #[tokio::test]
    async fn prompt_lifecycle() {
        let (handler, store) = handler();
        run(&handler, ".prompt set Pirata Fale como um pirata").await;
        let reply = run(&handler, ".prompt usar pirata").await;
        assert!(reply.text.contains("ativado"));
        assert_eq!(
            store.active_prompt_text("chat-1").await.unwrap().as_deref(),
            Some("Fale como um pirata")
        );

        let listing = run(&handler, ".prompt list").await;
        assert!(listing.text.contains("* pirata (ativo)"));

        run(&handler, ".prompt delete pirata").await;
        assert_eq!(store.active_prompt_text("chat-1").await.unwrap(), None);
        let missing = run(&handler, ".prompt get pirata").await;
        assert!(missing.text.contains("não encontrado"));
    }

    #[tokio::test]
    async fn toggles_flip_media_flags() {
        let (handler, store) = handler();
        let reply = run(&handler, ".audio").await;
        assert_eq!(reply.text, replies::toggle("áudio", false));
        assert!(!store.get_config("chat-1").await.unwrap().media_audio);
        run(&handler, ".audio").await;
        assert!(store.get_config("chat-1").await.unwrap().media_audio);
    }

    #[tokio::test]
    async fn config_get_and_set() {
        let (handler, store) = handler();
        let reply = run(&handler, ".config set description_mode longo").await;
        assert_eq!(reply.text, "description_mode = long");
        assert_eq!(
            store.get_config("chat-1").await.unwrap().description_mode,
            DescriptionMode::Long
        );

        let all = run(&handler, ".config get").await;
        assert!(all.text.contains("media_video = true"));
        assert!(all.text.contains("active_prompt = (nenhum)"));

        let bad = run(&handler, ".config set media_video talvez").await;
        assert!(bad.text.starts_with("Valor inválido"));
        let unknown = run(&handler, ".config get volume").await;
        assert!(unknown.text.contains("Chave desconhecida"));
    }

    #[tokio::test]
    async fn accessibility_mode_is_composite() {
        let (handler, store) = handler();
        run(&handler, ".imagem").await;
        run(&handler, ".cego").await;
        let config = store.get_config("chat-1").await.unwrap();
        assert!(config.media_image);
        assert_eq!(config.description_mode, DescriptionMode::Long);
        assert_eq!(config.active_prompt.as_deref(), Some("cego"));
    }

    #[tokio::test]
    async fn reset_restores_defaults() {
        let (handler, store) = handler();
        run(&handler, ".video").await;
        run(&handler, ".reset").await;
        assert_eq!(store.get_config("chat-1").await.unwrap(), ChatConfig::default());
    }

    #[tokio::test]
    async fn unknown_command_is_not_recognized() {
        let (handler, _) = handler();
        let reply = run(&handler, ".dançar").await;
        assert!(!reply.recognized);
        assert!(reply.text.contains(".dançar"));
    }
}
