// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mensageiro serve` command implementation.
//!
//! Opens the SQLite stores, builds the Gemini backend and the HTTP gateway,
//! starts the media worker pools, redelivers whatever a previous run left
//! behind and then dispatches events until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use mensageiro_agent::{DispatcherConfig, MessageDispatcher, RecoveryCoordinator, shutdown};
use mensageiro_config::MensageiroConfig;
use mensageiro_config::model::MediaConfig;
use mensageiro_core::{
    AiBackend, ChatPlatform, ConfigStore, JobQueue, MensageiroError, PluginAdapter,
    TransactionStore,
};
use mensageiro_gateway::GatewayPlatform;
use mensageiro_gemini::GeminiBackend;
use mensageiro_queue::{MediaJobProcessor, MediaQueueClient, WorkerPool, WorkerPoolConfig};
use mensageiro_resilience::{CircuitBreaker, CircuitBreakerConfig};
use mensageiro_storage::{Database, SqliteConfigStore, SqliteTransactionStore};

/// Runs the `mensageiro serve` command.
pub async fn run_serve(config: MensageiroConfig) -> Result<(), MensageiroError> {
    init_tracing(&config.bot.log_level);
    info!(bot = %config.bot.name, "starting mensageiro serve");

    let db = Database::open(&config.storage).await?;
    let transactions: Arc<dyn TransactionStore> = Arc::new(SqliteTransactionStore::new(
        db.clone(),
        config.transactions.max_attempts,
    ));
    let config_store: Arc<dyn ConfigStore> = Arc::new(SqliteConfigStore::new(db.clone()));

    let ai: Arc<dyn AiBackend> = Arc::new(GeminiBackend::new(&config.gemini)?);
    let platform = Arc::new(GatewayPlatform::new(
        config.gateway.clone(),
        config.bot.bot_id.clone(),
    )?);
    let breaker = Arc::new(CircuitBreaker::new(
        "ai-backend",
        CircuitBreakerConfig {
            failure_threshold: config.breaker.failure_threshold,
            reset_window: Duration::from_secs(config.breaker.reset_window_secs),
        },
    ));

    let cancel = shutdown::install_signal_handler();

    let mut dispatcher = MessageDispatcher::new(
        platform.clone(),
        Arc::clone(&ai),
        Arc::clone(&transactions),
        Arc::clone(&config_store),
        Arc::clone(&breaker),
        DispatcherConfig::from_config(&config),
    );
    let mut queues = Vec::new();
    if config.media.async_images {
        let queue = start_media_queue("images", config.media.image_workers, &config.media, &ai, &cancel);
        dispatcher = dispatcher.with_image_queue(Arc::clone(&queue));
        queues.push(queue);
    }
    if config.media.async_videos {
        let queue = start_media_queue("videos", config.media.video_workers, &config.media, &ai, &cancel);
        dispatcher = dispatcher.with_video_queue(Arc::clone(&queue));
        queues.push(queue);
    }
    let dispatcher = Arc::new(dispatcher);
    let result_handlers = dispatcher.register_result_handlers()?;

    let recovery = Arc::new(RecoveryCoordinator::new(
        platform.clone(),
        Arc::clone(&transactions),
        Duration::from_secs(config.transactions.recovery_retry_delay_secs),
    ));
    match recovery.recover_pending().await {
        Ok(report) if report.attempted > 0 => info!(
            delivered = report.delivered,
            failed = report.failed,
            abandoned = report.abandoned,
            "startup recovery finished"
        ),
        Ok(_) => {}
        Err(e) => error!(error = %e, "startup recovery failed"),
    }
    let recovery_task = tokio::spawn(Arc::clone(&recovery).run(cancel.clone()));

    platform.connect().await?;
    info!(
        host = %config.gateway.host,
        port = config.gateway.port,
        async_images = config.media.async_images,
        async_videos = config.media.async_videos,
        "mensageiro ready"
    );

    Arc::clone(&dispatcher).run(cancel.clone()).await;

    // The dispatcher also stops when the platform closes on its own.
    cancel.cancel();
    for queue in &queues {
        if let Err(e) = queue.shutdown().await {
            warn!(queue = %queue.name(), error = %e, "queue shutdown failed");
        }
    }
    for handle in result_handlers {
        handle.abort();
    }
    if let Err(e) = recovery_task.await {
        warn!(error = %e, "recovery task ended abnormally");
    }
    platform.shutdown().await?;
    ai.shutdown().await?;
    db.checkpoint().await?;

    info!("mensageiro serve shutdown complete");
    Ok(())
}

fn start_media_queue(
    name: &str,
    workers: usize,
    media: &MediaConfig,
    ai: &Arc<dyn AiBackend>,
    cancel: &CancellationToken,
) -> Arc<MediaQueueClient> {
    let pool: Arc<dyn JobQueue> = Arc::new(WorkerPool::start(
        WorkerPoolConfig {
            name: name.to_string(),
            workers,
            capacity: media.queue_capacity,
        },
        Arc::new(MediaJobProcessor::new(Arc::clone(ai))),
        cancel.clone(),
    ));
    Arc::new(MediaQueueClient::new(name, pool, media.max_media_bytes))
}

/// Log targets that follow `bot.log_level`; everything else logs at warn.
const LOG_TARGETS: &[&str] = &[
    "mensageiro",
    "mensageiro_agent",
    "mensageiro_gateway",
    "mensageiro_gemini",
    "mensageiro_queue",
    "mensageiro_resilience",
    "mensageiro_storage",
];

fn default_directives(log_level: &str) -> String {
    let mut directives: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={log_level}"))
        .collect();
    directives.push("warn".to_string());
    directives.join(",")
}

/// Initializes the tracing subscriber. `RUST_LOG` wins over `bot.log_level`.
pub(crate) fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    // A second init (tests, repeated commands) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}
