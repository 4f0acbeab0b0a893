// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Mensageiro configuration system.

use std::io::Write;

use mensageiro_config::diagnostic::ConfigError;
use mensageiro_config::model::MensageiroConfig;
use mensageiro_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn full_document_deserializes() {
    let toml = r#"
[bot]
name = "assistente"
log_level = "debug"
command_prefix = "!"
bot_id = "5511999999999@c.us"

[breaker]
failure_threshold = 3
reset_window_secs = 30

[transactions]
max_attempts = 5
recovery_retry_delay_secs = 1

[media]
max_media_bytes = 1048576
async_images = false
video_workers = 2

[dedup]
capacity = 100
ttl_secs = 60

[storage]
database_path = "/tmp/mensageiro.db"
wal_mode = false

[gemini]
api_key = "key"
model = "gemini-1.5-pro"

[gateway]
port = 8080
bearer_token = "secret"
outbound_url = "http://localhost:9000/send"
"#;

    let config = load_and_validate_str(toml).expect("valid document");
    assert_eq!(config.bot.name, "assistente");
    assert_eq!(config.bot.command_prefix, "!");
    assert_eq!(config.bot.bot_id.as_deref(), Some("5511999999999@c.us"));
    assert_eq!(config.breaker.failure_threshold, 3);
    assert_eq!(config.breaker.reset_window_secs, 30);
    assert_eq!(config.transactions.max_attempts, 5);
    assert_eq!(config.media.max_media_bytes, 1_048_576);
    assert!(!config.media.async_images);
    assert!(config.media.async_videos);
    assert_eq!(config.media.video_workers, 2);
    assert_eq!(config.dedup.capacity, 100);
    assert!(!config.storage.wal_mode);
    assert_eq!(config.gemini.api_key.as_deref(), Some("key"));
    assert_eq!(config.gateway.port, 8080);
    assert_eq!(config.gateway.host, "127.0.0.1");
}

#[test]
fn empty_document_yields_defaults() {
    let config = load_config_from_str("").expect("defaults");
    let defaults = MensageiroConfig::default();
    assert_eq!(config.bot.command_prefix, ".");
    assert_eq!(config.breaker.failure_threshold, 5);
    assert_eq!(config.breaker.reset_window_secs, 60);
    assert_eq!(config.transactions.max_attempts, 3);
    assert_eq!(config.media.max_media_bytes, 20 * 1024 * 1024);
    assert_eq!(config.media.image_timeout_secs, 120);
    assert_eq!(config.media.video_timeout_secs, 300);
    assert_eq!(config.dedup.ttl_secs, 3600);
    assert_eq!(config.storage.database_path, defaults.storage.database_path);
}

#[test]
fn typo_produces_unknown_key_with_suggestion() {
    let toml = r#"
[breaker]
failure_treshold = 3
"#;
    let errors = load_and_validate_str(toml).expect_err("unknown key");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "failure_treshold");
            assert_eq!(suggestion.as_deref(), Some("failure_threshold"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[telegram]
bot_token = "x"
"#;
    assert!(load_and_validate_str(toml).is_err());
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[media]
image_workers = "two"
"#;
    let errors = load_and_validate_str(toml).expect_err("invalid type");
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn semantic_errors_are_collected() {
    let toml = r#"
[breaker]
failure_threshold = 0

[transactions]
max_attempts = 0
"#;
    let errors = load_and_validate_str(toml).expect_err("validation");
    assert_eq!(errors.len(), 2);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn explicit_file_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[dedup]\ncapacity = 42").expect("write");
    let config = load_and_validate_path(file.path()).expect("valid file");
    assert_eq!(config.dedup.capacity, 42);
}

#[test]
fn env_vars_override_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("custom.toml", "[transactions]\nmax_attempts = 4\n")?;
        jail.set_env("MENSAGEIRO_TRANSACTIONS_MAX_ATTEMPTS", "7");
        jail.set_env("MENSAGEIRO_GATEWAY_BEARER_TOKEN", "from-env");
        let config = mensageiro_config::load_config_from_path(std::path::Path::new(
            "custom.toml",
        ))?;
        assert_eq!(config.transactions.max_attempts, 7);
        assert_eq!(config.gateway.bearer_token.as_deref(), Some("from-env"));
        Ok(())
    });
}
