// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation of configuration values.

use crate::diagnostic::ConfigError;
use crate::model::MensageiroConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates semantic constraints serde cannot express.
///
/// Collects every problem instead of failing on the first one.
pub fn validate_config(config: &MensageiroConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.bot.command_prefix.trim().is_empty() {
        fail("bot.command_prefix must not be empty".to_string());
    }

    if !LOG_LEVELS.contains(&config.bot.log_level.as_str()) {
        fail(format!(
            "bot.log_level `{}` is not one of {}",
            config.bot.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.breaker.failure_threshold < 1 {
        fail("breaker.failure_threshold must be at least 1".to_string());
    }

    if config.breaker.reset_window_secs < 1 {
        fail("breaker.reset_window_secs must be at least 1".to_string());
    }

    if config.transactions.max_attempts < 1 {
        fail("transactions.max_attempts must be at least 1".to_string());
    }

    if config.media.max_media_bytes == 0 {
        fail("media.max_media_bytes must be greater than 0".to_string());
    }

    for (key, value) in [
        ("media.image_timeout_secs", config.media.image_timeout_secs),
        ("media.video_timeout_secs", config.media.video_timeout_secs),
        ("dedup.ttl_secs", config.dedup.ttl_secs),
        ("gemini.request_timeout_secs", config.gemini.request_timeout_secs),
    ] {
        if value == 0 {
            fail(format!("{key} must be greater than 0"));
        }
    }

    for (key, value) in [
        ("media.image_workers", config.media.image_workers),
        ("media.video_workers", config.media.video_workers),
        ("media.queue_capacity", config.media.queue_capacity),
        ("dedup.capacity", config.dedup.capacity),
    ] {
        if value < 1 {
            fail(format!("{key} must be at least 1, got {value}"));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        fail("gateway.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        fail(format!(
            "gateway.host `{host}` is not a valid IP address or hostname"
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
