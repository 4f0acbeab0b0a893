// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-visible reply texts.

use mensageiro_core::format_megabytes;

pub const GENERIC_ERROR: &str =
    "Desculpe, não consegui processar sua mensagem agora. Tente novamente em instantes.";

pub const SAFETY_BLOCKED: &str =
    "Não posso responder a isso: o conteúdo foi bloqueado pela política de segurança.";

pub const ACCESSIBILITY_PROMPT_NAME: &str = "cego";

pub const ACCESSIBILITY_PROMPT: &str = "Você está ajudando uma pessoa cega ou com baixa visão. \
Descreva imagens e vídeos com o máximo de detalhes úteis, leia em voz alta qualquer texto \
visível e evite referências visuais vagas.";

pub fn media_too_large(limit_bytes: u64) -> String {
    format!(
        "O arquivo é grande demais. O limite é de {}.",
        format_megabytes(limit_bytes)
    )
}

pub fn unknown_command(prefix: &str, name: &str) -> String {
    format!("Comando desconhecido: {prefix}{name}. Envie {prefix}ajuda para ver os comandos.")
}

pub fn help(prefix: &str) -> String {
    let p = prefix;
    format!(
        "Comandos disponíveis:\n\
         {p}ajuda: mostra esta mensagem\n\
         {p}reset: restaura as configurações do chat\n\
         {p}prompt set <nome> <texto>: salva um prompt\n\
         {p}prompt get <nome>: mostra um prompt\n\
         {p}prompt list: lista os prompts\n\
         {p}prompt delete <nome>: apaga um prompt\n\
         {p}prompt usar <nome>: ativa um prompt\n\
         {p}prompt limpar: desativa o prompt ativo\n\
         {p}config get [chave]: mostra a configuração\n\
         {p}config set <chave> <valor>: altera a configuração\n\
         {p}audio, {p}video, {p}imagem: liga ou desliga o processamento da mídia\n\
         {p}longo, {p}curto: tamanho das descrições\n\
         {p}cego: modo de acessibilidade"
    )
}

pub fn usage(prefix: &str, text: &str) -> String {
    format!("Uso: {prefix}{text}")
}

pub fn toggle(label: &str, enabled: bool) -> String {
    let state = if enabled { "ativado" } else { "desativado" };
    format!("Processamento de {label} {state}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_limit_mentions_megabytes() {
        assert!(media_too_large(20 * 1024 * 1024).contains("20MB"));
    }

    #[test]
    fn help_uses_prefix() {
        let text = help("!");
        assert!(text.contains("!prompt usar <nome>"));
        assert!(!text.contains(".ajuda"));
    }
}
