// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs media jobs against the AI backend.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use mensageiro_core::{AiBackend, AiConfig, JobType, MediaPayload, MensageiroError, QueueJob};

use crate::pool::JobProcessor;

/// Images go to `process_image`; videos are spooled to a temporary file that
/// is removed once `process_video` returns.
pub struct MediaJobProcessor {
    ai: Arc<dyn AiBackend>,
}

impl MediaJobProcessor {
    pub fn new(ai: Arc<dyn AiBackend>) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl JobProcessor for MediaJobProcessor {
    async fn process(&self, job: &QueueJob) -> Result<String, MensageiroError> {
        let payload = &job.payload;
        let config = AiConfig {
            description_mode: payload.description_mode,
            system_prompt: payload.system_prompt.clone(),
        };
        let prompt = payload.user_prompt.as_deref();

        match job.job_type {
            JobType::ProcessImage => self.ai.process_image(&payload.media, prompt, &config).await,
            JobType::ProcessVideo => {
                let file = spool(&payload.media).await?;
                debug!(
                    transaction_id = %payload.transaction_id,
                    path = %file.path().display(),
                    "video spooled"
                );
                self.ai.process_video(file.path(), prompt, &config).await
            }
        }
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.split(';').next().unwrap_or_default().trim() {
        "video/mp4" => ".mp4",
        "video/3gpp" => ".3gp",
        "video/quicktime" => ".mov",
        "video/webm" => ".webm",
        "video/x-matroska" => ".mkv",
        _ => ".bin",
    }
}

async fn spool(media: &MediaPayload) -> Result<NamedTempFile, MensageiroError> {
    let data = media.data.clone();
    let suffix = extension_for(&media.mime_type);
    tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("mensageiro-video-")
            .suffix(suffix)
            .tempfile()?;
        file.write_all(&data)?;
        file.flush()?;
        Ok(file)
    })
    .await
    .map_err(|e| MensageiroError::Internal(format!("video spool task failed: {e}")))?
    .map_err(|e| MensageiroError::Internal(format!("cannot spool video: {e}")))
}
