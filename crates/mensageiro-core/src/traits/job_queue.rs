// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous job queue contract.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::MensageiroError;
use crate::job::{JobHandle, JobResult, QueueJob, QueueStatus};
use crate::traits::adapter::PluginAdapter;

/// A queue that runs media jobs out of band and reports their completion.
#[async_trait]
pub trait JobQueue: PluginAdapter {
    /// Accepts a job or fails with [`MensageiroError::QueueUnavailable`].
    async fn submit(&self, job: QueueJob) -> Result<JobHandle, MensageiroError>;

    async fn status(&self) -> Result<QueueStatus, MensageiroError>;

    /// Drops finished job records. With `only_completed`, failed ones are kept.
    async fn purge(&self, only_completed: bool) -> Result<usize, MensageiroError>;

    /// Hands out the completion stream. Only the first caller gets it.
    fn take_results(&self) -> Option<mpsc::Receiver<JobResult>>;
}

/// Receives completion payloads of media jobs.
#[async_trait]
pub trait JobResultHandler: Send + Sync + 'static {
    async fn handle_result(&self, result: JobResult);
}
