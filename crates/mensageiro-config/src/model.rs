// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Mensageiro.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so typos in the TOML files
//! are reported at startup instead of being silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level Mensageiro configuration.
///
/// Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MensageiroConfig {
    #[serde(default)]
    pub bot: BotConfig,

    /// Circuit breaker guarding the AI backend.
    #[serde(default)]
    pub breaker: BreakerConfig,

    #[serde(default)]
    pub transactions: TransactionsConfig,

    /// Media size ceiling and asynchronous processing.
    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    /// HTTP bridge to the chat platform.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Bot identity and command surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Platform id of the bot account. Used to detect mentions and replies in
    /// groups when the platform does not report it.
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            log_level: default_log_level(),
            command_prefix: default_command_prefix(),
            bot_id: None,
        }
    }
}

fn default_bot_name() -> String {
    "mensageiro".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_command_prefix() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds after the last failure before a probe is allowed.
    #[serde(default = "default_reset_window_secs")]
    pub reset_window_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_window_secs: default_reset_window_secs(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_window_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionsConfig {
    /// Delivery attempts before a transaction is permanently failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before a signalled transaction is re-attempted.
    #[serde(default = "default_recovery_retry_delay_secs")]
    pub recovery_retry_delay_secs: u64,
}

impl Default for TransactionsConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            recovery_retry_delay_secs: default_recovery_retry_delay_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_recovery_retry_delay_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    #[serde(default = "default_max_media_bytes")]
    pub max_media_bytes: u64,

    #[serde(default = "default_image_timeout_secs")]
    pub image_timeout_secs: u64,

    #[serde(default = "default_video_timeout_secs")]
    pub video_timeout_secs: u64,

    /// Route images through the worker pool instead of answering inline.
    #[serde(default = "default_true")]
    pub async_images: bool,

    #[serde(default = "default_true")]
    pub async_videos: bool,

    #[serde(default = "default_image_workers")]
    pub image_workers: usize,

    #[serde(default = "default_video_workers")]
    pub video_workers: usize,

    /// Pending jobs a queue accepts before rejecting submissions.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_media_bytes: default_max_media_bytes(),
            image_timeout_secs: default_image_timeout_secs(),
            video_timeout_secs: default_video_timeout_secs(),
            async_images: true,
            async_videos: true,
            image_workers: default_image_workers(),
            video_workers: default_video_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_max_media_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_image_timeout_secs() -> u64 {
    120
}

fn default_video_timeout_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_image_workers() -> usize {
    2
}

fn default_video_workers() -> usize {
    1
}

fn default_queue_capacity() -> usize {
    64
}

/// Bounds of the duplicate-message cache.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    #[serde(default = "default_dedup_capacity")]
    pub capacity: usize,

    #[serde(default = "default_dedup_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            capacity: default_dedup_capacity(),
            ttl_secs: default_dedup_ttl_secs(),
        }
    }
}

fn default_dedup_capacity() -> usize {
    10_000
}

fn default_dedup_ttl_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("mensageiro").join("mensageiro.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("mensageiro.db"))
        .to_string_lossy()
        .into_owned()
}

/// Google Gemini REST backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeminiConfig {
    /// API key. `None` requires `GEMINI_API_KEY` in the environment.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Token the bridge must present on inbound requests. Unset rejects all.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Bridge endpoint that receives outbound messages.
    #[serde(default)]
    pub outbound_url: Option<String>,

    #[serde(default)]
    pub outbound_token: Option<String>,

    /// How long chat, mention and media details of an event are kept.
    #[serde(default = "default_event_retention_secs")]
    pub event_retention_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
            outbound_url: None,
            outbound_token: None,
            event_retention_secs: default_event_retention_secs(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_event_retention_secs() -> u64 {
    600
}
