// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Gemini backend for Mensageiro.
//!
//! Implements [`AiBackend`] over the REST `generateContent` endpoint. Media is
//! sent inline as base64; the chat's active prompt becomes the system
//! instruction.

pub mod client;
pub mod prompts;
pub mod types;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

use mensageiro_config::model::GeminiConfig;
use mensageiro_core::{
    AdapterType, AiBackend, AiConfig, HealthStatus, MediaPayload, MensageiroError, PluginAdapter,
    TextRequest,
};

use crate::client::GeminiClient;
use crate::types::{Content, GenerateContentRequest, Part};

pub struct GeminiBackend {
    client: GeminiClient,
}

impl GeminiBackend {
    /// Builds the backend. The key comes from config or `GEMINI_API_KEY`.
    pub fn new(config: &GeminiConfig) -> Result<Self, MensageiroError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                MensageiroError::Config(
                    "Gemini API key missing: set gemini.api_key or GEMINI_API_KEY".into(),
                )
            })?;

        let client = GeminiClient::new(
            &api_key,
            config.model.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        info!(model = %config.model, "Gemini backend initialized");
        Ok(Self { client })
    }

    fn request(parts: Vec<Part>, system_prompt: Option<&str>) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::user(parts)],
            system_instruction: system_prompt
                .filter(|p| !p.trim().is_empty())
                .map(Content::system),
        }
    }

    fn inline(media: &MediaPayload) -> Part {
        Part::inline(media.mime_type.clone(), STANDARD.encode(&media.data))
    }
}

#[async_trait]
impl PluginAdapter for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::AiBackend
    }

    async fn health_check(&self) -> Result<HealthStatus, MensageiroError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MensageiroError> {
        Ok(())
    }
}

#[async_trait]
impl AiBackend for GeminiBackend {
    async fn process_text(&self, request: TextRequest) -> Result<String, MensageiroError> {
        let text = match request.quoted_text.as_deref() {
            Some(quoted) => format!("Mensagem citada: \"{quoted}\"\n\n{}", request.text),
            None => request.text.clone(),
        };
        debug!(chat_id = %request.chat_id, "text request");
        self.client
            .generate(&Self::request(
                vec![Part::text(text)],
                request.system_prompt.as_deref(),
            ))
            .await
    }

    async fn process_image(
        &self,
        media: &MediaPayload,
        prompt: Option<&str>,
        config: &AiConfig,
    ) -> Result<String, MensageiroError> {
        let instruction =
            prompts::with_user_prompt(prompts::image_prompt(config.description_mode), prompt);
        self.client
            .generate(&Self::request(
                vec![Self::inline(media), Part::text(instruction)],
                config.system_prompt.as_deref(),
            ))
            .await
    }

    async fn process_audio(
        &self,
        media: &MediaPayload,
        message_id: &str,
        config: &AiConfig,
    ) -> Result<String, MensageiroError> {
        debug!(%message_id, size_bytes = media.size_bytes(), "audio request");
        self.client
            .generate(&Self::request(
                vec![Self::inline(media), Part::text(prompts::audio_prompt())],
                config.system_prompt.as_deref(),
            ))
            .await
    }

    async fn process_video(
        &self,
        path: &Path,
        prompt: Option<&str>,
        config: &AiConfig,
    ) -> Result<String, MensageiroError> {
        let data = tokio::fs::read(path).await.map_err(|e| MensageiroError::AiBackend {
            message: format!("cannot read video file {}: {e}", path.display()),
            source: Some(Box::new(e)),
        })?;
        let media = MediaPayload {
            data,
            mime_type: video_mime(path).to_string(),
            filename: None,
        };
        let instruction =
            prompts::with_user_prompt(prompts::video_prompt(config.description_mode), prompt);
        self.client
            .generate(&Self::request(
                vec![Self::inline(&media), Part::text(instruction)],
                config.system_prompt.as_deref(),
            ))
            .await
    }
}

fn video_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("3gp") => "video/3gpp",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        _ => "video/mp4",
    }
}
