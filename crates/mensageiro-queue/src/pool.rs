// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process [`JobQueue`] backed by a fixed set of tokio worker tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mensageiro_core::{
    AdapterType, HealthStatus, JobHandle, JobQueue, JobResult, JobState, MensageiroError,
    PluginAdapter, QueueJob, QueueStatus,
};

/// Executes one job and returns the text answer.
#[async_trait]
pub trait JobProcessor: Send + Sync + 'static {
    async fn process(&self, job: &QueueJob) -> Result<String, MensageiroError>;
}

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub name: String,
    pub workers: usize,
    /// Pending jobs accepted before submissions are rejected.
    pub capacity: usize,
}

/// Finished-job tallies. Finished jobs leave the job map, only these remain.
#[derive(Debug, Default)]
struct Finished {
    completed: AtomicUsize,
    failed: AtomicUsize,
}

/// Bounded job channel drained by `workers` tasks.
///
/// A job that exceeds its `options.timeout` is reported as a failed
/// [`JobResult`]. Results are delivered on the stream handed out by
/// [`JobQueue::take_results`]; workers stall once `capacity` results are
/// waiting there unread. The job map holds waiting and active jobs only.
pub struct WorkerPool {
    name: String,
    sender: mpsc::Sender<QueueJob>,
    results: std::sync::Mutex<Option<mpsc::Receiver<JobResult>>>,
    jobs: Arc<DashMap<String, JobState>>,
    finished: Arc<Finished>,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawns the workers. Must be called inside a tokio runtime.
    pub fn start(
        config: WorkerPoolConfig,
        processor: Arc<dyn JobProcessor>,
        cancel: CancellationToken,
    ) -> Self {
        let capacity = config.capacity.max(1);
        let (sender, receiver) = mpsc::channel::<QueueJob>(capacity);
        let (results_tx, results_rx) = mpsc::channel::<JobResult>(capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let jobs = Arc::new(DashMap::new());
        let finished = Arc::new(Finished::default());
        let cancel = cancel.child_token();

        let handles = (0..config.workers.max(1))
            .map(|index| {
                tokio::spawn(worker_loop(
                    format!("{}-{index}", config.name),
                    Arc::clone(&receiver),
                    results_tx.clone(),
                    Arc::clone(&processor),
                    Arc::clone(&jobs),
                    Arc::clone(&finished),
                    cancel.clone(),
                ))
            })
            .collect();

        info!(queue = %config.name, workers = config.workers, capacity, "worker pool started");

        Self {
            name: config.name,
            sender,
            results: std::sync::Mutex::new(Some(results_rx)),
            jobs,
            finished,
            cancel,
            handles: Mutex::new(handles),
        }
    }

    fn count(&self, state: JobState) -> usize {
        self.jobs.iter().filter(|entry| *entry.value() == state).count()
    }

    /// Waiting and active job records.
    pub fn tracked_jobs(&self) -> usize {
        self.jobs.len()
    }
}

async fn worker_loop(
    worker: String,
    receiver: Arc<Mutex<mpsc::Receiver<QueueJob>>>,
    results: mpsc::Sender<JobResult>,
    processor: Arc<dyn JobProcessor>,
    jobs: Arc<DashMap<String, JobState>>,
    finished: Arc<Finished>,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                job = receiver.recv() => job,
            }
        };
        let Some(job) = next else {
            break;
        };

        jobs.insert(job.id.clone(), JobState::Active);
        debug!(
            %worker,
            job_id = %job.id,
            transaction_id = %job.payload.transaction_id,
            job_type = %job.job_type,
            "job started"
        );

        let outcome = tokio::time::timeout(job.options.timeout, processor.process(&job)).await;
        let result = match outcome {
            Ok(Ok(response)) => {
                finished.completed.fetch_add(1, Ordering::Relaxed);
                JobResult::success(&job.payload, response)
            }
            Ok(Err(e)) => {
                finished.failed.fetch_add(1, Ordering::Relaxed);
                warn!(%worker, job_id = %job.id, error = %e, "job failed");
                JobResult::failure(&job.payload, e.to_string())
            }
            Err(_) => {
                finished.failed.fetch_add(1, Ordering::Relaxed);
                let timeout = MensageiroError::Timeout {
                    duration: job.options.timeout,
                };
                warn!(%worker, job_id = %job.id, "job timed out");
                JobResult::failure(&job.payload, timeout.to_string())
            }
        };
        jobs.remove(&job.id);

        if results.send(result).await.is_err() {
            debug!(%worker, job_id = %job.id, "result stream closed");
        }
    }
    debug!(%worker, "worker stopped");
}

#[async_trait]
impl PluginAdapter for WorkerPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::JobQueue
    }

    async fn health_check(&self) -> Result<HealthStatus, MensageiroError> {
        if self.cancel.is_cancelled() {
            Ok(HealthStatus::Unhealthy("worker pool stopped".into()))
        } else if self.sender.capacity() == 0 {
            Ok(HealthStatus::Degraded("job queue is full".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    /// Stops taking jobs and waits for running ones to finish.
    async fn shutdown(&self) -> Result<(), MensageiroError> {
        self.cancel.cancel();
        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(queue = %self.name, error = %e, "worker task ended abnormally");
            }
        }
        info!(queue = %self.name, "worker pool stopped");
        Ok(())
    }
}

#[async_trait]
impl JobQueue for WorkerPool {
    async fn submit(&self, job: QueueJob) -> Result<JobHandle, MensageiroError> {
        if self.cancel.is_cancelled() {
            return Err(MensageiroError::QueueUnavailable {
                message: format!("{} queue is shutting down", self.name),
            });
        }

        let id = job.id.clone();
        self.jobs.insert(id.clone(), JobState::Waiting);
        if let Err(e) = self.sender.try_send(job) {
            self.jobs.remove(&id);
            let message = match e {
                mpsc::error::TrySendError::Full(_) => format!("{} queue is full", self.name),
                mpsc::error::TrySendError::Closed(_) => format!("{} queue is closed", self.name),
            };
            return Err(MensageiroError::QueueUnavailable { message });
        }
        Ok(JobHandle { id })
    }

    async fn status(&self) -> Result<QueueStatus, MensageiroError> {
        Ok(QueueStatus {
            name: self.name.clone(),
            waiting: self.count(JobState::Waiting),
            active: self.count(JobState::Active),
            completed: self.finished.completed.load(Ordering::Relaxed),
            failed: self.finished.failed.load(Ordering::Relaxed),
        })
    }

    async fn purge(&self, only_completed: bool) -> Result<usize, MensageiroError> {
        let mut purged = self.finished.completed.swap(0, Ordering::Relaxed);
        if !only_completed {
            purged += self.finished.failed.swap(0, Ordering::Relaxed);
        }
        Ok(purged)
    }

    fn take_results(&self) -> Option<mpsc::Receiver<JobResult>> {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}
