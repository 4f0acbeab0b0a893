// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP bridge implementing [`ChatPlatform`].
//!
//! A bridge process in front of the messaging network POSTs event envelopes to
//! `/v1/events`; replies are POSTed back to the bridge's `outbound_url`. Chat
//! details, mentions, the quoted message and media travel with the envelope and
//! are served from a short-lived store by the lazy accessors.

pub mod auth;
pub mod envelope;
pub mod handlers;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use mensageiro_config::model::GatewayConfig;
use mensageiro_core::{
    AdapterType, ChatInfo, ChatPlatform, HealthStatus, InboundEvent, MediaPayload,
    MensageiroError, MessageId, OutboundMessage, PluginAdapter, QuotedMessage,
};

use crate::auth::AuthConfig;
use crate::envelope::{EventExtras, ExtrasStore, OutboundRequest, OutboundResponse};
use crate::server::GatewayState;

/// Group chat ids on the bridge end with this suffix.
const GROUP_SUFFIX: &str = "@g.us";

pub struct GatewayPlatform {
    config: GatewayConfig,
    bot_id: Option<String>,
    http: reqwest::Client,
    inbound_tx: mpsc::Sender<InboundEvent>,
    inbound_rx: Mutex<mpsc::Receiver<InboundEvent>>,
    extras: Arc<ExtrasStore>,
    cancel: CancellationToken,
    server_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl GatewayPlatform {
    pub fn new(config: GatewayConfig, bot_id: Option<String>) -> Result<Self, MensageiroError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MensageiroError::Delivery {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let extras = Arc::new(ExtrasStore::new(Duration::from_secs(
            config.event_retention_secs,
        )));
        Ok(Self {
            config,
            bot_id,
            http,
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            extras,
            cancel: CancellationToken::new(),
            server_handle: Mutex::new(None),
        })
    }

    /// Queues an event as if it had arrived over HTTP.
    pub async fn inject(&self, event: InboundEvent, extras: EventExtras) -> Result<(), MensageiroError> {
        self.extras.insert(&event.id, extras);
        self.inbound_tx
            .send(event)
            .await
            .map_err(|_| MensageiroError::Internal("gateway inbound channel closed".into()))
    }

    fn extras(&self, event: &InboundEvent) -> Option<EventExtras> {
        self.extras.get(&event.id)
    }
}

#[async_trait]
impl PluginAdapter for GatewayPlatform {
    fn name(&self) -> &str {
        "gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, MensageiroError> {
        let handle = self.server_handle.lock().await;
        match handle.as_ref() {
            Some(h) if !h.is_finished() => Ok(HealthStatus::Healthy),
            Some(_) => Ok(HealthStatus::Unhealthy("server stopped".to_string())),
            None => Ok(HealthStatus::Unhealthy("server not started".to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), MensageiroError> {
        self.cancel.cancel();
        let handle = self.server_handle.lock().await.take();
        if let Some(h) = handle {
            let _ = h.await;
        }
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for GatewayPlatform {
    async fn connect(&self) -> Result<(), MensageiroError> {
        let mut server_handle = self.server_handle.lock().await;
        if server_handle.is_some() {
            return Ok(());
        }
        if self.config.outbound_url.is_none() {
            tracing::warn!("gateway.outbound_url is not set; replies cannot be delivered");
        }

        let state = GatewayState {
            inbound_tx: self.inbound_tx.clone(),
            extras: Arc::clone(&self.extras),
            auth: AuthConfig {
                bearer_token: self.config.bearer_token.clone(),
            },
            start_time: std::time::Instant::now(),
        };
        let host = self.config.host.clone();
        let port = self.config.port;
        let cancel = self.cancel.clone();
        *server_handle = Some(tokio::spawn(async move {
            if let Err(e) = server::start_server(&host, port, state, cancel).await {
                tracing::error!(error = %e, "gateway server error");
            }
        }));

        tracing::info!(host = %self.config.host, port = self.config.port, "gateway platform connected");
        Ok(())
    }

    async fn next_event(&self) -> Option<InboundEvent> {
        let mut rx = self.inbound_rx.lock().await;
        tokio::select! {
            event = rx.recv() => event,
            _ = self.cancel.cancelled() => None,
        }
    }

    async fn chat(&self, event: &InboundEvent) -> Result<ChatInfo, MensageiroError> {
        if let Some(chat) = self.extras(event).and_then(|x| x.chat) {
            return Ok(chat);
        }
        Ok(ChatInfo {
            id: event.from.clone(),
            name: None,
            is_group: event.from.ends_with(GROUP_SUFFIX),
        })
    }

    async fn mentions(&self, event: &InboundEvent) -> Result<Vec<String>, MensageiroError> {
        Ok(self.extras(event).map(|x| x.mentions).unwrap_or_default())
    }

    async fn quoted_message(
        &self,
        event: &InboundEvent,
    ) -> Result<Option<QuotedMessage>, MensageiroError> {
        Ok(self.extras(event).and_then(|x| x.quoted))
    }

    async fn download_media(&self, event: &InboundEvent) -> Result<MediaPayload, MensageiroError> {
        self.extras(event).and_then(|x| x.media).ok_or_else(|| {
            MensageiroError::Validation(format!(
                "no media available for message {} (expired or never sent)",
                event.id
            ))
        })
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, MensageiroError> {
        let url = self.config.outbound_url.as_deref().ok_or_else(|| MensageiroError::Delivery {
            message: "gateway.outbound_url is not configured".into(),
            source: None,
        })?;

        let body = OutboundRequest {
            target: msg.target,
            text: msg.text,
            reply_to: msg.options.reply_to,
            transaction_id: msg.transaction_id,
            is_recovered_message: msg.options.is_recovered_message,
        };

        let mut request = self.http.post(url).json(&body);
        if let Some(token) = self.config.outbound_token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| MensageiroError::Delivery {
            message: format!("bridge request failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MensageiroError::Delivery {
                message: format!("bridge returned {status}: {text}"),
                source: None,
            });
        }

        let parsed: OutboundResponse = response.json().await.unwrap_or_default();
        Ok(MessageId(parsed.id.unwrap_or_default()))
    }

    fn bot_id(&self) -> Option<String> {
        self.bot_id.clone()
    }
}
