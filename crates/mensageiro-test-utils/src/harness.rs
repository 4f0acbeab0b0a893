// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness wiring the real dispatcher to mock collaborators.
//!
//! ```ignore
//! let harness = TestHarness::builder().with_replies(vec!["olá".into()]).build().await?;
//! assert!(harness.send_event(text_event("m1", "55@c.us", "oi")).await);
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mensageiro_agent::{DispatcherConfig, MessageDispatcher, RecoveryCoordinator};
use mensageiro_config::model::StorageConfig;
use mensageiro_core::{
    ConfigStore, DEFAULT_MAX_ATTEMPTS, EventKind, InboundEvent, JobQueue, MediaPayload,
    MensageiroError, OutboundMessage, PluginAdapter, TransactionStore,
};
use mensageiro_queue::{MediaJobProcessor, MediaQueueClient, WorkerPool, WorkerPoolConfig};
use mensageiro_resilience::{CircuitBreaker, CircuitBreakerConfig};
use mensageiro_storage::{
    Database, MemoryConfigStore, MemoryTransactionStore, SqliteConfigStore, SqliteTransactionStore,
};

use crate::mock_ai::MockAiBackend;
use crate::mock_platform::MockPlatform;

enum StorageChoice {
    Memory,
    /// SQLite in a fresh temp directory.
    TempSqlite,
    /// SQLite at a caller-owned path, so a test can reopen it.
    SqliteAt(PathBuf),
}

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    replies: Vec<String>,
    ai_delay: Option<Duration>,
    storage: StorageChoice,
    dispatcher: DispatcherConfig,
    breaker: CircuitBreakerConfig,
    max_attempts: u32,
    recovery_delay: Duration,
    async_images: bool,
    async_videos: bool,
    workers: usize,
    queue_capacity: usize,
    bot_id: Option<String>,
}

impl TestHarnessBuilder {
    pub fn new() -> Self {
        Self {
            replies: Vec::new(),
            ai_delay: None,
            storage: StorageChoice::Memory,
            dispatcher: DispatcherConfig {
                drain_timeout: Duration::from_secs(5),
                ..DispatcherConfig::default()
            },
            breaker: CircuitBreakerConfig::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            recovery_delay: Duration::from_millis(20),
            async_images: false,
            async_videos: false,
            workers: 2,
            queue_capacity: 16,
            bot_id: None,
        }
    }

    /// Scripted AI replies, consumed in order.
    pub fn with_replies(mut self, replies: Vec<String>) -> Self {
        self.replies = replies;
        self
    }

    pub fn with_ai_delay(mut self, delay: Duration) -> Self {
        self.ai_delay = Some(delay);
        self
    }

    /// Use SQLite stores in a temp directory instead of the in-memory ones.
    pub fn with_sqlite(mut self) -> Self {
        self.storage = StorageChoice::TempSqlite;
        self
    }

    pub fn with_sqlite_at(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage = StorageChoice::SqliteAt(path.into());
        self
    }

    pub fn with_dispatcher_config(mut self, config: DispatcherConfig) -> Self {
        self.dispatcher = config;
        self
    }

    pub fn with_max_media_bytes(mut self, bytes: u64) -> Self {
        self.dispatcher.max_media_bytes = bytes;
        self
    }

    pub fn with_breaker(mut self, failure_threshold: u32, reset_window: Duration) -> Self {
        self.breaker = CircuitBreakerConfig {
            failure_threshold,
            reset_window,
        };
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_recovery_delay(mut self, delay: Duration) -> Self {
        self.recovery_delay = delay;
        self
    }

    /// Route images through a worker pool.
    pub fn with_async_images(mut self) -> Self {
        self.async_images = true;
        self
    }

    pub fn with_async_videos(mut self) -> Self {
        self.async_videos = true;
        self
    }

    pub fn with_queue(mut self, workers: usize, capacity: usize) -> Self {
        self.workers = workers;
        self.queue_capacity = capacity;
        self
    }

    /// Bot account id reported by the mock platform.
    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_id = Some(bot_id.into());
        self
    }

    pub async fn build(self) -> Result<TestHarness, MensageiroError> {
        let (database, temp_dir) = match self.storage {
            StorageChoice::Memory => (None, None),
            StorageChoice::TempSqlite => {
                let dir = tempfile::tempdir().map_err(|e| MensageiroError::Internal(e.to_string()))?;
                let db = open_sqlite(dir.path().join("mensageiro.db")).await?;
                (Some(db), Some(dir))
            }
            StorageChoice::SqliteAt(path) => (Some(open_sqlite(path).await?), None),
        };

        let (transactions, config_store, memory_ledger): (
            Arc<dyn TransactionStore>,
            Arc<dyn ConfigStore>,
            Option<Arc<MemoryTransactionStore>>,
        ) = match database {
            Some(db) => (
                Arc::new(SqliteTransactionStore::new(db.clone(), self.max_attempts)),
                Arc::new(SqliteConfigStore::new(db)),
                None,
            ),
            None => {
                let ledger = Arc::new(MemoryTransactionStore::new(self.max_attempts));
                (ledger.clone(), Arc::new(MemoryConfigStore::new()), Some(ledger))
            }
        };

        let platform = Arc::new(match self.bot_id {
            Some(id) => MockPlatform::with_bot_id(id),
            None => MockPlatform::new(),
        });
        let mut ai = MockAiBackend::with_replies(self.replies);
        if let Some(delay) = self.ai_delay {
            ai = ai.with_delay(delay);
        }
        let ai = Arc::new(ai);
        let breaker = Arc::new(CircuitBreaker::new("ai-backend", self.breaker));
        let cancel = CancellationToken::new();

        let mut dispatcher = MessageDispatcher::new(
            platform.clone(),
            ai.clone(),
            Arc::clone(&transactions),
            Arc::clone(&config_store),
            Arc::clone(&breaker),
            self.dispatcher.clone(),
        );

        let mut queues = Vec::new();
        let pool_config = |name: &str| WorkerPoolConfig {
            name: name.to_string(),
            workers: self.workers,
            capacity: self.queue_capacity,
        };
        if self.async_images {
            let queue = start_queue(pool_config("images"), &ai, &cancel, self.dispatcher.max_media_bytes);
            dispatcher = dispatcher.with_image_queue(Arc::clone(&queue));
            queues.push(queue);
        }
        if self.async_videos {
            let queue = start_queue(pool_config("videos"), &ai, &cancel, self.dispatcher.max_media_bytes);
            dispatcher = dispatcher.with_video_queue(Arc::clone(&queue));
            queues.push(queue);
        }

        let dispatcher = Arc::new(dispatcher);
        let result_handlers = dispatcher.register_result_handlers()?;
        let recovery = Arc::new(RecoveryCoordinator::new(
            platform.clone(),
            Arc::clone(&transactions),
            self.recovery_delay,
        ));

        Ok(TestHarness {
            platform,
            ai,
            transactions,
            config_store,
            memory_ledger,
            breaker,
            dispatcher,
            recovery,
            queues,
            cancel,
            result_handlers,
            _temp_dir: temp_dir,
        })
    }
}

impl Default for TestHarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn open_sqlite(path: PathBuf) -> Result<Database, MensageiroError> {
    Database::open(&StorageConfig {
        database_path: path.to_string_lossy().into_owned(),
        wal_mode: true,
    })
    .await
}

fn start_queue(
    config: WorkerPoolConfig,
    ai: &Arc<MockAiBackend>,
    cancel: &CancellationToken,
    max_media_bytes: u64,
) -> Arc<MediaQueueClient> {
    let name = config.name.clone();
    let processor = Arc::new(MediaJobProcessor::new(ai.clone()));
    let pool: Arc<dyn JobQueue> = Arc::new(WorkerPool::start(config, processor, cancel.clone()));
    Arc::new(MediaQueueClient::new(name, pool, max_media_bytes))
}

/// The real dispatcher and recovery coordinator over mock collaborators.
pub struct TestHarness {
    pub platform: Arc<MockPlatform>,
    pub ai: Arc<MockAiBackend>,
    pub transactions: Arc<dyn TransactionStore>,
    pub config_store: Arc<dyn ConfigStore>,
    /// Set when the in-memory stores are used.
    pub memory_ledger: Option<Arc<MemoryTransactionStore>>,
    pub breaker: Arc<CircuitBreaker>,
    pub dispatcher: Arc<MessageDispatcher>,
    pub recovery: Arc<RecoveryCoordinator>,
    pub queues: Vec<Arc<MediaQueueClient>>,
    pub cancel: CancellationToken,
    result_handlers: Vec<JoinHandle<()>>,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Runs one event through the dispatcher.
    pub async fn send_event(&self, event: InboundEvent) -> bool {
        self.dispatcher.process_message(event).await
    }

    /// Queues `media` for the event and runs it through the dispatcher.
    pub async fn send_media(&self, event: InboundEvent, media: MediaPayload) -> bool {
        self.platform.set_media(&event.id, media).await;
        self.send_event(event).await
    }

    pub async fn sent(&self) -> Vec<OutboundMessage> {
        self.platform.sent_messages().await
    }

    /// Polls until at least `count` messages were sent or `timeout` elapses.
    pub async fn wait_for_sent(&self, count: usize, timeout: Duration) -> Vec<OutboundMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.platform.sent_messages().await;
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stops queues and result handlers.
    pub async fn shutdown(self) -> Result<(), MensageiroError> {
        self.cancel.cancel();
        for queue in &self.queues {
            queue.shutdown().await?;
        }
        for handle in self.result_handlers {
            handle.abort();
        }
        self.platform.shutdown().await
    }
}

// --- Event builders ---

pub fn text_event(id: &str, from: &str, body: &str) -> InboundEvent {
    InboundEvent {
        id: id.to_string(),
        from: from.to_string(),
        author: None,
        body: body.to_string(),
        has_media: false,
        kind: EventKind::Chat,
        has_quoted_msg: false,
        timestamp: 0,
    }
}

/// A text event inside a group, sent by `author`.
pub fn group_event(id: &str, group: &str, author: &str, body: &str) -> InboundEvent {
    InboundEvent {
        author: Some(author.to_string()),
        ..text_event(id, group, body)
    }
}

pub fn media_event(id: &str, from: &str, kind: EventKind, caption: &str) -> InboundEvent {
    InboundEvent {
        has_media: true,
        kind,
        ..text_event(id, from, caption)
    }
}

pub fn media_payload(size_bytes: usize, mime_type: &str) -> MediaPayload {
    MediaPayload {
        data: vec![0u8; size_bytes],
        mime_type: mime_type.to_string(),
        filename: None,
    }
}
