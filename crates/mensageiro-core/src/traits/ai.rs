// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generative AI backend trait.

use std::path::Path;

use async_trait::async_trait;

use crate::error::MensageiroError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{AiConfig, MediaPayload, TextRequest};

/// Turns user content into a text answer.
///
/// Every method may fail with [`MensageiroError::SafetyBlocked`] when the
/// provider refuses the content; other failures are
/// [`MensageiroError::AiBackend`].
#[async_trait]
pub trait AiBackend: PluginAdapter {
    async fn process_text(&self, request: TextRequest) -> Result<String, MensageiroError>;

    async fn process_image(
        &self,
        media: &MediaPayload,
        prompt: Option<&str>,
        config: &AiConfig,
    ) -> Result<String, MensageiroError>;

    async fn process_audio(
        &self,
        media: &MediaPayload,
        message_id: &str,
        config: &AiConfig,
    ) -> Result<String, MensageiroError>;

    /// Videos are handed over as a file on disk.
    async fn process_video(
        &self,
        path: &Path,
        prompt: Option<&str>,
        config: &AiConfig,
    ) -> Result<String, MensageiroError>;
}
