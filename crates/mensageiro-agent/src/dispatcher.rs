// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message dispatcher.
//!
//! Every inbound event goes through [`MessageDispatcher::process_message`]:
//! validation, dedup, group addressing, classification, per-chat toggles, then
//! either a command reply or a tracked transaction. Text and audio (and media
//! without a queue) are answered inline behind the circuit breaker; images and
//! videos with a queue are submitted and resolved later by
//! [`JobResultHandler::handle_result`].
//!
//! Nothing escapes this boundary: failures become `false`, a log record and,
//! where it helps, a reply to the user.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mensageiro_config::model::MensageiroConfig;
use mensageiro_core::{
    AiBackend, AiConfig, ChatConfig, ChatInfo, ChatPlatform, ConfigStore, InboundEvent,
    JobOptions, JobPayload, JobResult, JobResultHandler, JobType, MediaPayload, MensageiroError,
    MessageKind, OutboundMessage, QueueJob, QuotedMessage, RecoveryData, SendOptions, TextRequest,
    TransactionStore,
};
use mensageiro_queue::{JobProcessor, MediaJobProcessor, MediaQueueClient};
use mensageiro_resilience::CircuitBreaker;

use crate::classify::{self, Classification};
use crate::commands::CommandHandler;
use crate::dedup::DedupCache;
use crate::replies;

/// Settings the dispatcher reads from the bot, media and dedup sections.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub command_prefix: String,
    pub bot_id: Option<String>,
    pub max_media_bytes: u64,
    pub image_timeout: Duration,
    pub video_timeout: Duration,
    pub dedup_capacity: usize,
    pub dedup_ttl: Duration,
    /// How long `run` waits for in-flight events after cancellation.
    pub drain_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from_config(&MensageiroConfig::default())
    }
}

impl DispatcherConfig {
    pub fn from_config(config: &MensageiroConfig) -> Self {
        Self {
            command_prefix: config.bot.command_prefix.clone(),
            bot_id: config.bot.bot_id.clone(),
            max_media_bytes: config.media.max_media_bytes,
            image_timeout: Duration::from_secs(config.media.image_timeout_secs),
            video_timeout: Duration::from_secs(config.media.video_timeout_secs),
            dedup_capacity: config.dedup.capacity,
            dedup_ttl: Duration::from_secs(config.dedup.ttl_secs),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Where the answer of a transaction goes.
struct Turn {
    transaction_id: String,
    target: String,
    message_id: String,
}

pub struct MessageDispatcher {
    platform: Arc<dyn ChatPlatform>,
    ai: Arc<dyn AiBackend>,
    transactions: Arc<dyn TransactionStore>,
    config_store: Arc<dyn ConfigStore>,
    breaker: Arc<CircuitBreaker>,
    commands: CommandHandler,
    dedup: DedupCache,
    image_queue: Option<Arc<MediaQueueClient>>,
    video_queue: Option<Arc<MediaQueueClient>>,
    config: DispatcherConfig,
}

impl MessageDispatcher {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        ai: Arc<dyn AiBackend>,
        transactions: Arc<dyn TransactionStore>,
        config_store: Arc<dyn ConfigStore>,
        breaker: Arc<CircuitBreaker>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            commands: CommandHandler::new(Arc::clone(&config_store), config.command_prefix.clone()),
            dedup: DedupCache::new(config.dedup_capacity, config.dedup_ttl),
            platform,
            ai,
            transactions,
            config_store,
            breaker,
            image_queue: None,
            video_queue: None,
            config,
        }
    }

    /// Routes images through `queue` instead of answering them inline.
    pub fn with_image_queue(mut self, queue: Arc<MediaQueueClient>) -> Self {
        self.image_queue = Some(queue);
        self
    }

    pub fn with_video_queue(mut self, queue: Arc<MediaQueueClient>) -> Self {
        self.video_queue = Some(queue);
        self
    }

    /// Registers the dispatcher as result handler of every configured queue.
    pub fn register_result_handlers(
        self: &Arc<Self>,
    ) -> Result<Vec<JoinHandle<()>>, MensageiroError> {
        let mut handles = Vec::new();
        for queue in [&self.image_queue, &self.video_queue].into_iter().flatten() {
            let handler: Arc<dyn JobResultHandler> = Arc::clone(self) as Arc<dyn JobResultHandler>;
            handles.push(queue.on_result(handler)?);
        }
        Ok(handles)
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn bot_id(&self) -> Option<String> {
        self.config.bot_id.clone().or_else(|| self.platform.bot_id())
    }

    /// Pulls events until the platform closes or `cancel` fires. Each event
    /// runs on its own task; in-flight events are drained on the way out.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!("dispatcher running");
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                event = self.platform.next_event() => {
                    let Some(event) = event else {
                        info!("platform event stream closed");
                        break;
                    };
                    let dispatcher = Arc::clone(&self);
                    tasks.spawn(async move {
                        dispatcher.process_message(event).await;
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "event task panicked");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping dispatcher");
                    break;
                }
            }
        }

        if !tasks.is_empty() {
            info!(count = tasks.len(), "waiting for in-flight events");
            let drained = tokio::time::timeout(self.config.drain_timeout, async {
                while tasks.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                warn!(remaining = tasks.len(), "drain timeout reached, aborting events");
                tasks.abort_all();
            }
        }
        info!("dispatcher stopped");
    }

    /// Handles one inbound event. Returns true when the event was answered or
    /// accepted for asynchronous processing.
    pub async fn process_message(&self, event: InboundEvent) -> bool {
        match self.admit(&event) {
            Ok(()) => {}
            Err(e @ MensageiroError::Validation(_)) => {
                warn!(message_id = %event.id, error = %e, "dropping malformed event");
                return false;
            }
            Err(e) => {
                debug!(message_id = %event.id, error = %e, "message ignored");
                return false;
            }
        }

        let prefix = self.config.command_prefix.as_str();
        let classification = classify::classify(&event, prefix);
        if classification == Classification::System {
            debug!(message_id = %event.id, kind = %event.kind, "system event ignored");
            return false;
        }

        let chat = match self.platform.chat(&event).await {
            Ok(chat) => chat,
            Err(e) => {
                warn!(message_id = %event.id, error = %e, "chat lookup failed");
                return false;
            }
        };

        let mut mentions = Vec::new();
        let mut quoted = None;
        if chat.is_group {
            mentions = self.platform.mentions(&event).await.unwrap_or_else(|e| {
                debug!(error = %e, "mention lookup failed");
                Vec::new()
            });
            quoted = self.fetch_quoted(&event).await;
            let bot_id = self.bot_id();
            if !classify::addresses_bot(&event, &mentions, quoted.as_ref(), bot_id.as_deref(), prefix) {
                debug!(message_id = %event.id, chat_id = %chat.id, "group message not addressed to the bot");
                return false;
            }
        }

        let kind = match classification {
            Classification::Command(command) => {
                return self.handle_command(&event, &chat, &command).await;
            }
            Classification::Text => MessageKind::Text,
            Classification::Media(kind) => kind,
            Classification::System | Classification::Unsupported => {
                debug!(message_id = %event.id, kind = %event.kind, "unsupported event ignored");
                return false;
            }
        };

        let chat_config = match self.config_store.get_config(&chat.id).await {
            Ok(config) => config,
            Err(e) => {
                error!(chat_id = %chat.id, error = %e, "config lookup failed");
                return false;
            }
        };
        if !chat_config.allows(kind) {
            let e = MensageiroError::FeatureDisabled {
                kind,
                chat_id: chat.id.clone(),
            };
            debug!(message_id = %event.id, error = %e, "message ignored");
            return false;
        }

        let text = if chat.is_group {
            classify::strip_bot_mentions(&event.body, self.bot_id().as_deref(), &mentions)
        } else {
            event.body.trim().to_string()
        };
        if kind == MessageKind::Text && text.is_empty() {
            debug!(message_id = %event.id, "nothing left to answer after removing mentions");
            return false;
        }

        let transaction = match self.transactions.create(&event, &chat, kind).await {
            Ok(tx) => tx,
            Err(e) => {
                error!(message_id = %event.id, error = %e, "failed to create transaction");
                self.send_plain(&chat.id, &event.id, replies::GENERIC_ERROR).await;
                return false;
            }
        };
        let turn = Turn {
            transaction_id: transaction.id.clone(),
            target: chat.id.clone(),
            message_id: event.id.clone(),
        };
        info!(transaction_id = %turn.transaction_id, chat_id = %chat.id, %kind, "transaction created");

        let recovery = RecoveryData {
            recipient_id: chat.id.clone(),
            chat_id: chat.id.clone(),
        };
        if let Err(e) = self
            .transactions
            .attach_recovery_data(&turn.transaction_id, recovery)
            .await
        {
            warn!(transaction_id = %turn.transaction_id, error = %e, "failed to attach recovery data");
        }

        let system_prompt = self
            .config_store
            .active_prompt_text(&chat.id)
            .await
            .unwrap_or_else(|e| {
                warn!(chat_id = %chat.id, error = %e, "active prompt lookup failed");
                None
            });

        match kind {
            MessageKind::Text => {
                if quoted.is_none() {
                    quoted = self.fetch_quoted(&event).await;
                }
                let request = TextRequest {
                    chat_id: chat.id.clone(),
                    sender_id: event.sender_id().to_string(),
                    text,
                    system_prompt,
                    quoted_text: quoted.and_then(|q| q.body),
                };
                self.run_sync(&turn, self.ai.process_text(request)).await
            }
            MessageKind::Audio | MessageKind::Image | MessageKind::Video => {
                let Some(media) = self.fetch_media(&event, &turn).await else {
                    return false;
                };
                let user_prompt = (!text.is_empty()).then_some(text);
                self.handle_media(&event, &turn, kind, media, user_prompt, &chat_config, system_prompt)
                    .await
            }
        }
    }

    /// Shape check and dedup. A rejected event leaves no trace.
    fn admit(&self, event: &InboundEvent) -> Result<(), MensageiroError> {
        if event.id.trim().is_empty() || event.from.trim().is_empty() {
            return Err(MensageiroError::Validation(
                "event without id or chat reference".into(),
            ));
        }
        if !self.dedup.insert_if_absent(&event.id) {
            return Err(MensageiroError::DuplicateMessage {
                message_id: event.id.clone(),
            });
        }
        Ok(())
    }

    async fn fetch_quoted(&self, event: &InboundEvent) -> Option<QuotedMessage> {
        if !event.has_quoted_msg {
            return None;
        }
        self.platform.quoted_message(event).await.unwrap_or_else(|e| {
            debug!(message_id = %event.id, error = %e, "quoted message lookup failed");
            None
        })
    }

    /// Downloads the media and applies the size ceiling.
    async fn fetch_media(&self, event: &InboundEvent, turn: &Turn) -> Option<MediaPayload> {
        let media = match self.platform.download_media(event).await {
            Ok(media) => media,
            Err(e) => {
                self.fail(turn, &e).await;
                return None;
            }
        };

        let limit = self.config.max_media_bytes;
        if media.size_bytes() > limit {
            self.reject_oversized(turn, media.size_bytes()).await;
            return None;
        }
        Some(media)
    }

    async fn reject_oversized(&self, turn: &Turn, size_bytes: u64) {
        let limit = self.config.max_media_bytes;
        warn!(transaction_id = %turn.transaction_id, size_bytes, limit, "media exceeds size limit");
        let reason = MensageiroError::MediaTooLarge {
            size_bytes,
            limit_bytes: limit,
        };
        if let Err(e) = self
            .transactions
            .abandon(&turn.transaction_id, &reason.to_string())
            .await
        {
            warn!(transaction_id = %turn.transaction_id, error = %e, "failed to abandon transaction");
        }
        self.send_plain(&turn.target, &turn.message_id, &replies::media_too_large(limit))
            .await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_media(
        &self,
        event: &InboundEvent,
        turn: &Turn,
        kind: MessageKind,
        media: MediaPayload,
        user_prompt: Option<String>,
        chat_config: &ChatConfig,
        system_prompt: Option<String>,
    ) -> bool {
        let ai_config = AiConfig {
            description_mode: chat_config.description_mode,
            system_prompt: system_prompt.clone(),
        };

        let (queue, job_type, timeout) = match kind {
            MessageKind::Image => (&self.image_queue, JobType::ProcessImage, self.config.image_timeout),
            MessageKind::Video => (&self.video_queue, JobType::ProcessVideo, self.config.video_timeout),
            _ => {
                let call = self.ai.process_audio(&media, &event.id, &ai_config);
                return self.run_sync(turn, call).await;
            }
        };

        let payload = JobPayload {
            chat_id: turn.target.clone(),
            sender_id: event.sender_id().to_string(),
            message_id: event.id.clone(),
            user_prompt,
            description_mode: chat_config.description_mode,
            system_prompt,
            transaction_id: turn.transaction_id.clone(),
            media,
        };
        let options = JobOptions { timeout };

        match queue {
            Some(queue) => self.run_async(turn, queue, job_type, payload, options).await,
            None if kind == MessageKind::Image => {
                let call = self.ai.process_image(
                    &payload.media,
                    payload.user_prompt.as_deref(),
                    &ai_config,
                );
                self.run_sync(turn, call).await
            }
            None => {
                // Video without a queue still needs the bytes on disk.
                let job = QueueJob {
                    id: turn.transaction_id.clone(),
                    job_type,
                    payload,
                    options,
                };
                let processor = MediaJobProcessor::new(Arc::clone(&self.ai));
                let call = async move {
                    match tokio::time::timeout(timeout, processor.process(&job)).await {
                        Ok(result) => result,
                        Err(_) => Err(MensageiroError::Timeout { duration: timeout }),
                    }
                };
                self.run_sync(turn, call).await
            }
        }
    }

    /// Inline path: breaker gate, AI call, delivery.
    async fn run_sync(
        &self,
        turn: &Turn,
        call: impl Future<Output = Result<String, MensageiroError>> + Send,
    ) -> bool {
        if !self.begin_processing(turn).await {
            return false;
        }
        match call.await {
            Ok(response) => {
                self.breaker.record_success();
                self.deliver(turn, response).await
            }
            Err(e) => {
                self.record_ai_outcome(&e);
                self.fail(turn, &e).await;
                false
            }
        }
    }

    /// Queue path: breaker gate, submission, return immediately.
    async fn run_async(
        &self,
        turn: &Turn,
        queue: &MediaQueueClient,
        job_type: JobType,
        payload: JobPayload,
        options: JobOptions,
    ) -> bool {
        if !self.begin_processing(turn).await {
            return false;
        }
        match queue.submit(job_type, payload, options).await {
            Ok(handle) => {
                info!(
                    transaction_id = %turn.transaction_id,
                    job_id = %handle.id,
                    queue = %queue.name(),
                    "media job submitted"
                );
                true
            }
            Err(MensageiroError::MediaTooLarge { size_bytes, .. }) => {
                self.reject_oversized(turn, size_bytes).await;
                false
            }
            Err(e) => {
                self.fail(turn, &e).await;
                false
            }
        }
    }

    /// Moves the transaction to processing and checks the breaker.
    async fn begin_processing(&self, turn: &Turn) -> bool {
        match self.transactions.mark_processing(&turn.transaction_id).await {
            Ok(0) => {
                warn!(transaction_id = %turn.transaction_id, "transaction not in a processable state");
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                error!(transaction_id = %turn.transaction_id, error = %e, "failed to mark processing");
                return false;
            }
        }

        if !self.breaker.can_execute() {
            let e = MensageiroError::ServiceUnavailable {
                component: self.breaker.name().to_string(),
            };
            warn!(transaction_id = %turn.transaction_id, "circuit open, short-circuiting");
            self.fail(turn, &e).await;
            return false;
        }
        true
    }

    /// Safety refusals mean the backend answered; they do not count as failures.
    fn record_ai_outcome(&self, error: &MensageiroError) {
        if error.is_safety_blocked() {
            self.breaker.record_success();
        } else {
            self.breaker.record_failure();
        }
    }

    /// Attaches the response, sends it and marks the transaction delivered.
    async fn deliver(&self, turn: &Turn, response: String) -> bool {
        let id = &turn.transaction_id;
        match self.transactions.attach_response(id, &response).await {
            Ok(0) => {
                warn!(transaction_id = %id, "transaction vanished before the response was attached");
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                error!(transaction_id = %id, error = %e, "failed to attach response");
                return false;
            }
        }

        let message = OutboundMessage {
            target: turn.target.clone(),
            text: response,
            transaction_id: Some(id.clone()),
            options: SendOptions {
                reply_to: Some(turn.message_id.clone()),
                is_recovered_message: false,
            },
        };
        match self.platform.send(message).await {
            Ok(_) => {
                if let Err(e) = self.transactions.mark_delivered(id).await {
                    error!(transaction_id = %id, error = %e, "failed to mark delivered");
                }
                info!(transaction_id = %id, "response delivered");
                true
            }
            Err(e) => {
                warn!(transaction_id = %id, error = %e, "delivery failed, left for recovery");
                if let Err(e) = self.transactions.record_delivery_failure(id, &e.to_string()).await {
                    error!(transaction_id = %id, error = %e, "failed to record delivery failure");
                }
                false
            }
        }
    }

    /// Records the failure on the transaction and tells the user.
    async fn fail(&self, turn: &Turn, error: &MensageiroError) {
        warn!(transaction_id = %turn.transaction_id, error = %error, "processing failed");
        if let Err(e) = self
            .transactions
            .record_delivery_failure(&turn.transaction_id, &error.to_string())
            .await
        {
            error!(transaction_id = %turn.transaction_id, error = %e, "failed to record failure");
        }
        let text = if error.is_safety_blocked() {
            replies::SAFETY_BLOCKED
        } else {
            replies::GENERIC_ERROR
        };
        self.send_plain(&turn.target, &turn.message_id, text).await;
    }

    async fn handle_command(
        &self,
        event: &InboundEvent,
        chat: &ChatInfo,
        command: &classify::ParsedCommand,
    ) -> bool {
        match self.commands.handle(&chat.id, command).await {
            Ok(reply) => {
                self.send_plain(&chat.id, &event.id, &reply.text).await;
                reply.recognized
            }
            Err(e) => {
                error!(chat_id = %chat.id, command = %command.name, error = %e, "command failed");
                self.send_plain(&chat.id, &event.id, replies::GENERIC_ERROR).await;
                false
            }
        }
    }

    /// Sends a reply that is not tied to a transaction. Errors are logged.
    async fn send_plain(&self, target: &str, reply_to: &str, text: &str) {
        let mut message = OutboundMessage::reply(target, text);
        message.options.reply_to = Some(reply_to.to_string());
        if let Err(e) = self.platform.send(message).await {
            warn!(chat_id = %target, error = %e, "failed to send reply");
        }
    }
}

#[async_trait]
impl JobResultHandler for MessageDispatcher {
    async fn handle_result(&self, result: JobResult) {
        let id = result.transaction_id.clone();
        let transaction = match self.transactions.get(&id).await {
            Ok(Some(tx)) if !tx.status.is_terminal() => tx,
            Ok(_) => {
                debug!(transaction_id = %id, "job result for inactive transaction ignored");
                return;
            }
            Err(e) => {
                error!(transaction_id = %id, error = %e, "transaction lookup failed");
                return;
            }
        };

        let turn = Turn {
            transaction_id: id,
            target: transaction
                .recovery_data
                .map(|r| r.recipient_id)
                .unwrap_or(result.chat_id),
            message_id: result.message_id,
        };

        match (result.response, result.error) {
            (_, Some(error)) => {
                let e = MensageiroError::from_backend_message(error);
                self.record_ai_outcome(&e);
                self.fail(&turn, &e).await;
            }
            (Some(response), None) => {
                self.breaker.record_success();
                self.deliver(&turn, response).await;
            }
            (None, None) => {
                let e = MensageiroError::Internal("job finished without a response".into());
                self.fail(&turn, &e).await;
            }
        }
    }
}
