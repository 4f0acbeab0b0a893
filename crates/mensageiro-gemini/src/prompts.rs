// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Default instructions sent along with media.

use mensageiro_core::DescriptionMode;

const IMAGE_SHORT: &str = "Descreva esta imagem de forma breve e objetiva, em português, \
em no máximo três frases.";

const IMAGE_LONG: &str = "Descreva esta imagem em detalhes, em português, para uma pessoa \
que não pode vê-la: pessoas, objetos, cores, textos visíveis, disposição dos elementos e \
contexto geral.";

const VIDEO_SHORT: &str = "Resuma este vídeo de forma breve, em português, dizendo o que \
acontece e o que se ouve.";

const VIDEO_LONG: &str = "Descreva este vídeo em detalhes, em português, cena a cena, \
incluindo ações, pessoas, textos visíveis e o áudio (falas e sons).";

const AUDIO: &str = "Transcreva este áudio em português. Responda apenas com a transcrição; \
se não houver fala, descreva brevemente os sons.";

pub fn image_prompt(mode: DescriptionMode) -> &'static str {
    match mode {
        DescriptionMode::Short => IMAGE_SHORT,
        DescriptionMode::Long => IMAGE_LONG,
    }
}

pub fn video_prompt(mode: DescriptionMode) -> &'static str {
    match mode {
        DescriptionMode::Short => VIDEO_SHORT,
        DescriptionMode::Long => VIDEO_LONG,
    }
}

pub fn audio_prompt() -> &'static str {
    AUDIO
}

/// Default instruction followed by the user's own question, when present.
pub fn with_user_prompt(default: &str, user_prompt: Option<&str>) -> String {
    match user_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        Some(question) => format!("{default}\n\nPergunta do usuário: {question}"),
        None => default.to_string(),
    }
}
