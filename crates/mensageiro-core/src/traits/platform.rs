// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat platform adapter trait.

use async_trait::async_trait;

use crate::error::MensageiroError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatInfo, InboundEvent, MediaPayload, MessageId, OutboundMessage, QuotedMessage};

/// Event source and outbound delivery for a chat platform.
///
/// Details that are expensive to fetch (chat metadata, mentions, quoted
/// message, media bytes) are resolved lazily per event.
#[async_trait]
pub trait ChatPlatform: PluginAdapter {
    /// Starts receiving events.
    async fn connect(&self) -> Result<(), MensageiroError>;

    /// Waits for the next inbound event. `None` means the platform closed.
    async fn next_event(&self) -> Option<InboundEvent>;

    async fn chat(&self, event: &InboundEvent) -> Result<ChatInfo, MensageiroError>;

    /// Platform ids mentioned in the event body.
    async fn mentions(&self, event: &InboundEvent) -> Result<Vec<String>, MensageiroError>;

    async fn quoted_message(
        &self,
        event: &InboundEvent,
    ) -> Result<Option<QuotedMessage>, MensageiroError>;

    async fn download_media(&self, event: &InboundEvent) -> Result<MediaPayload, MensageiroError>;

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, MensageiroError>;

    /// Platform id of the bot account, when the platform knows it.
    fn bot_id(&self) -> Option<String> {
        None
    }
}
