// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `/etc/mensageiro/mensageiro.toml`
//! 3. `~/.config/mensageiro/mensageiro.toml`
//! 4. `./mensageiro.toml`
//! 5. `MENSAGEIRO_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::MensageiroConfig;

pub const SYSTEM_CONFIG_PATH: &str = "/etc/mensageiro/mensageiro.toml";
pub const LOCAL_CONFIG_PATH: &str = "mensageiro.toml";

/// Sections addressable through environment variables.
const ENV_SECTIONS: &[&str] = &[
    "bot",
    "breaker",
    "transactions",
    "media",
    "dedup",
    "storage",
    "gemini",
    "gateway",
];

/// User-level config file under the XDG config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mensageiro").join("mensageiro.toml"))
}

/// Builds the full layered Figment without extracting it.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MensageiroConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

pub fn load_config() -> Result<MensageiroConfig, figment::Error> {
    build_figment().extract()
}

/// Loads an explicit file (no XDG lookup) with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MensageiroConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MensageiroConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Loads defaults plus an inline TOML document. No env overrides.
pub fn load_config_from_str(toml_content: &str) -> Result<MensageiroConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MensageiroConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// `MENSAGEIRO_MEDIA_MAX_MEDIA_BYTES` maps to `media.max_media_bytes`.
///
/// Only the leading section name is turned into a dot; `split("_")` would also
/// split field names that contain underscores.
fn env_provider() -> Env {
    Env::prefixed("MENSAGEIRO_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(field) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{field}");
        }
    }
    key.to_string()
}
