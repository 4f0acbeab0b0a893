// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media job contract shared by queue clients and their workers.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::{DescriptionMode, MediaPayload};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum JobType {
    ProcessImage,
    ProcessVideo,
}

/// Everything a worker needs to process one media message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub chat_id: String,
    pub sender_id: String,
    pub message_id: String,
    /// Caption or text accompanying the media.
    pub user_prompt: Option<String>,
    pub description_mode: DescriptionMode,
    pub system_prompt: Option<String>,
    /// Correlation key back to the originating transaction.
    pub transaction_id: String,
    pub media: MediaPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueJob {
    pub id: String,
    pub job_type: JobType,
    pub payload: JobPayload,
    pub options: JobOptions,
}

/// Returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
}

/// Completion payload of a media job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub response: Option<String>,
    pub error: Option<String>,
    pub sender_id: String,
    pub chat_id: String,
    pub message_id: String,
    pub transaction_id: String,
}

impl JobResult {
    pub fn success(payload: &JobPayload, response: String) -> Self {
        Self::from_payload(payload, Some(response), None)
    }

    pub fn failure(payload: &JobPayload, error: String) -> Self {
        Self::from_payload(payload, None, Some(error))
    }

    fn from_payload(
        payload: &JobPayload,
        response: Option<String>,
        error: Option<String>,
    ) -> Self {
        Self {
            response,
            error,
            sender_id: payload.sender_id.clone(),
            chat_id: payload.chat_id.clone(),
            message_id: payload.message_id.clone(),
            transaction_id: payload.transaction_id.clone(),
        }
    }
}

/// State of a job still held by a queue. Finished jobs are only counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Waiting,
    Active,
}

/// Counters reported by the queue's administrative surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub name: String,
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}
