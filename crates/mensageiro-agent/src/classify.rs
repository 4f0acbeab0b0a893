// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event classification, group addressing and mention handling.

use mensageiro_core::{EventKind, InboundEvent, MessageKind, QuotedMessage};

/// What the dispatcher should do with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Command(ParsedCommand),
    Text,
    Media(MessageKind),
    /// Membership and notification events.
    System,
    /// Stickers, documents, empty text and unknown types.
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lowercased command word without the prefix.
    pub name: String,
    /// Remainder of the line, trimmed. Case is kept.
    pub args: String,
}

impl ParsedCommand {
    /// Splits the first whitespace-separated word off the arguments.
    pub fn split_first_arg(args: &str) -> (String, String) {
        let trimmed = args.trim();
        match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head.to_lowercase(), rest.trim().to_string()),
            None => (trimmed.to_lowercase(), String::new()),
        }
    }
}

pub fn parse_command(body: &str, prefix: &str) -> Option<ParsedCommand> {
    let rest = body.trim_start().strip_prefix(prefix)?;
    let (name, args) = ParsedCommand::split_first_arg(rest);
    if name.is_empty() {
        return None;
    }
    Some(ParsedCommand { name, args })
}

pub fn classify(event: &InboundEvent, prefix: &str) -> Classification {
    if event.kind.is_system() {
        return Classification::System;
    }
    if let Some(command) = parse_command(&event.body, prefix) {
        return Classification::Command(command);
    }
    if event.has_media || event.kind.media_kind().is_some() {
        return match event.kind.media_kind() {
            Some(kind) => Classification::Media(kind),
            None => Classification::Unsupported,
        };
    }
    match event.kind {
        EventKind::Chat if !event.body.trim().is_empty() => Classification::Text,
        _ => Classification::Unsupported,
    }
}

/// Local part of a platform id (`5511999@c.us` → `5511999`).
fn handle_of(id: &str) -> &str {
    id.split('@').next().unwrap_or(id)
}

/// Whether a group message is meant for the bot: it mentions the bot, replies
/// to one of the bot's messages, or starts with the command prefix.
pub fn addresses_bot(
    event: &InboundEvent,
    mentions: &[String],
    quoted: Option<&QuotedMessage>,
    bot_id: Option<&str>,
    prefix: &str,
) -> bool {
    if event.body.trim_start().starts_with(prefix) {
        return true;
    }
    if quoted.is_some_and(|q| q.from_me) {
        return true;
    }
    let Some(bot_id) = bot_id else {
        return false;
    };
    let bot_handle = handle_of(bot_id);
    if let Some(q) = quoted {
        if q.author.as_deref().is_some_and(|a| handle_of(a) == bot_handle) {
            return true;
        }
    }
    mentions.iter().any(|m| handle_of(m) == bot_handle)
}

/// Removes `@handle` tokens of the bot from the text sent to the AI.
pub fn strip_bot_mentions(body: &str, bot_id: Option<&str>, mentions: &[String]) -> String {
    let handles: Vec<&str> = match bot_id {
        Some(id) => vec![handle_of(id)],
        None => mentions.iter().map(|m| handle_of(m)).collect(),
    };
    body.split_whitespace()
        .filter(|word| {
            let Some(tag) = word.strip_prefix('@') else {
                return true;
            };
            let tag = tag.trim_end_matches(|c: char| !c.is_alphanumeric());
            !handles.contains(&tag)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
