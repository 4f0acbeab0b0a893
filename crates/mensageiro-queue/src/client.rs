// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Submission side of the media pipeline.
//!
//! One client exists per media kind. It gates payload size, keeps at most one
//! job in flight per transaction and forwards completions to the single
//! registered [`JobResultHandler`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mensageiro_core::{
    JobHandle, JobOptions, JobPayload, JobQueue, JobResultHandler, JobType, MensageiroError,
    QueueJob, QueueStatus,
};

pub struct MediaQueueClient {
    name: String,
    queue: Arc<dyn JobQueue>,
    max_media_bytes: u64,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl MediaQueueClient {
    pub fn new(name: impl Into<String>, queue: Arc<dyn JobQueue>, max_media_bytes: u64) -> Self {
        Self {
            name: name.into(),
            queue,
            max_media_bytes,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_media_bytes(&self) -> u64 {
        self.max_media_bytes
    }

    fn in_flight(&self) -> MutexGuard<'_, HashSet<String>> {
        lock_set(&self.in_flight)
    }

    /// Whether a job for the transaction was submitted and has not completed.
    pub fn is_in_flight(&self, transaction_id: &str) -> bool {
        self.in_flight().contains(transaction_id)
    }

    /// Submits a media job.
    ///
    /// Oversized media fails with `MediaTooLarge` before the queue is touched.
    /// A second submission for a transaction still in flight fails with
    /// `DuplicateSubmission`. Queue rejections are returned as-is.
    pub async fn submit(
        &self,
        job_type: JobType,
        payload: JobPayload,
        options: JobOptions,
    ) -> Result<JobHandle, MensageiroError> {
        let size_bytes = payload.media.size_bytes();
        if size_bytes > self.max_media_bytes {
            return Err(MensageiroError::MediaTooLarge {
                size_bytes,
                limit_bytes: self.max_media_bytes,
            });
        }

        let transaction_id = payload.transaction_id.clone();
        if !self.in_flight().insert(transaction_id.clone()) {
            return Err(MensageiroError::DuplicateSubmission { transaction_id });
        }

        let job = QueueJob {
            id: Uuid::new_v4().to_string(),
            job_type,
            payload,
            options,
        };
        match self.queue.submit(job).await {
            Ok(handle) => {
                debug!(
                    queue = %self.name,
                    job_id = %handle.id,
                    %transaction_id,
                    size_bytes,
                    "media job submitted"
                );
                Ok(handle)
            }
            Err(e) => {
                self.in_flight().remove(&transaction_id);
                Err(e)
            }
        }
    }

    /// Registers the result handler and starts forwarding completions to it.
    ///
    /// Only one handler can ever be registered per client.
    pub fn on_result(
        &self,
        handler: Arc<dyn JobResultHandler>,
    ) -> Result<JoinHandle<()>, MensageiroError> {
        let mut results = self.queue.take_results().ok_or_else(|| {
            MensageiroError::Internal(format!(
                "{} queue already has a result handler",
                self.name
            ))
        })?;
        let in_flight = Arc::clone(&self.in_flight);
        let name = self.name.clone();
        info!(queue = %name, "result handler registered");

        Ok(tokio::spawn(async move {
            while let Some(result) = results.recv().await {
                let transaction_id = result.transaction_id.clone();
                handler.handle_result(result).await;
                lock_set(&in_flight).remove(&transaction_id);
            }
            warn!(queue = %name, "result stream ended");
        }))
    }

    pub async fn status(&self) -> Result<QueueStatus, MensageiroError> {
        self.queue.status().await
    }

    pub async fn purge(&self, only_completed: bool) -> Result<usize, MensageiroError> {
        self.queue.purge(only_completed).await
    }

    pub async fn shutdown(&self) -> Result<(), MensageiroError> {
        self.queue.shutdown().await
    }
}

fn lock_set(set: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::pool::{JobProcessor, WorkerPool, WorkerPoolConfig};
    use mensageiro_core::{DescriptionMode, JobResult, MediaPayload};

    struct Echo;

    #[async_trait]
    impl JobProcessor for Echo {
        async fn process(&self, job: &QueueJob) -> Result<String, MensageiroError> {
            if job.payload.user_prompt.as_deref() == Some("wait") {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Ok(format!("echo {}", job.payload.message_id))
        }
    }

    struct Forward(mpsc::UnboundedSender<JobResult>);

    #[async_trait]
    impl JobResultHandler for Forward {
        async fn handle_result(&self, result: JobResult) {
            let _ = self.0.send(result);
        }
    }

    fn payload(tx: &str, bytes: usize, prompt: &str) -> JobPayload {
        JobPayload {
            chat_id: "chat".into(),
            sender_id: "sender".into(),
            message_id: format!("m-{tx}"),
            user_prompt: Some(prompt.into()),
            description_mode: DescriptionMode::Short,
            system_prompt: None,
            transaction_id: tx.into(),
            media: MediaPayload {
                data: vec![0; bytes],
                mime_type: "image/jpeg".into(),
                filename: None,
            },
        }
    }

    fn options() -> JobOptions {
        JobOptions {
            timeout: Duration::from_secs(5),
        }
    }

    fn client(limit: u64) -> MediaQueueClient {
        let pool = WorkerPool::start(
            WorkerPoolConfig {
                name: "image".into(),
                workers: 1,
                capacity: 8,
            },
            Arc::new(Echo),
            CancellationToken::new(),
        );
        MediaQueueClient::new("image", Arc::new(pool), limit)
    }

    #[tokio::test]
    async fn oversized_media_never_reaches_queue() {
        let client = client(10);
        let err = client
            .submit(JobType::ProcessImage, payload("t1", 11, ""), options())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MensageiroError::MediaTooLarge {
                size_bytes: 11,
                limit_bytes: 10
            }
        ));
        assert!(!client.is_in_flight("t1"));
        let status = client.status().await.unwrap();
        assert_eq!(status.waiting + status.active + status.completed, 0);
    }

    #[tokio::test]
    async fn results_are_correlated_by_transaction() {
        let client = client(1024);
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.on_result(Arc::new(Forward(tx))).unwrap();

        client
            .submit(JobType::ProcessImage, payload("t2", 4, ""), options())
            .await
            .unwrap();
        let result = rx.recv().await.unwrap();
        assert_eq!(result.transaction_id, "t2");
        assert_eq!(result.response.as_deref(), Some("echo m-t2"));
    }

    #[tokio::test]
    async fn second_handler_is_rejected() {
        let client = client(1024);
        let (tx, _rx) = mpsc::unbounded_channel();
        client.on_result(Arc::new(Forward(tx.clone()))).unwrap();
        assert!(client.on_result(Arc::new(Forward(tx))).is_err());
    }

    #[tokio::test]
    async fn duplicate_submission_while_in_flight() {
        let client = client(1024);
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.on_result(Arc::new(Forward(tx))).unwrap();

        client
            .submit(JobType::ProcessImage, payload("t3", 4, "wait"), options())
            .await
            .unwrap();
        let err = client
            .submit(JobType::ProcessImage, payload("t3", 4, "wait"), options())
            .await
            .unwrap_err();
        assert!(matches!(err, MensageiroError::DuplicateSubmission { .. }));

        rx.recv().await.unwrap();
        // The forwarder clears the entry right after the handler returns.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!client.is_in_flight("t3"));
    }
}
