// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Mensageiro message engine.
//!
//! Defines the error type, the domain types (events, transactions, media jobs,
//! per-chat settings) and the traits through which the engine reaches its
//! collaborators: chat platform, AI backend, stores and job queues.

pub mod error;
pub mod job;
pub mod traits;
pub mod transaction;
pub mod types;

pub use error::{MensageiroError, SAFETY_MARKER};
pub use job::{JobHandle, JobOptions, JobPayload, JobResult, JobState, JobType, QueueJob, QueueStatus};
pub use transaction::{
    DEFAULT_MAX_ATTEMPTS, HistoryEntry, RecoveryData, RecoverySignal, Transaction,
    TransactionStatus,
};
pub use types::{
    AdapterType, AiConfig, CHAT_CONFIG_KEYS, ChatConfig, ChatInfo, DescriptionMode, EventKind, HealthStatus,
    InboundEvent, MediaPayload, MessageId, MessageKind, NamedPrompt, OutboundMessage,
    QuotedMessage, SendOptions, TextRequest,
};

pub use traits::{
    AiBackend, ChatPlatform, ConfigStore, JobQueue, JobResultHandler, PluginAdapter,
    TransactionStore,
};

/// Default media ceiling: 20 MiB.
pub const DEFAULT_MAX_MEDIA_BYTES: u64 = 20 * 1024 * 1024;

/// Renders a byte ceiling the way users read it, e.g. `20MB`.
pub fn format_megabytes(bytes: u64) -> String {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    if (mb - mb.round()).abs() < f64::EPSILON {
        format!("{}MB", mb.round() as u64)
    } else {
        format!("{mb:.1}MB")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ceiling_renders_as_20mb() {
        assert_eq!(format_megabytes(DEFAULT_MAX_MEDIA_BYTES), "20MB");
        assert_eq!(format_megabytes(1536 * 1024), "1.5MB");
    }

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;
        for variant in [
            AdapterType::Platform,
            AdapterType::AiBackend,
            AdapterType::TransactionStore,
            AdapterType::ConfigStore,
            AdapterType::JobQueue,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn job_type_uses_queue_names() {
        assert_eq!(JobType::ProcessImage.to_string(), "process-image");
        let json = serde_json::to_string(&JobType::ProcessVideo).unwrap();
        assert_eq!(json, "\"process-video\"");
    }

    #[test]
    fn all_traits_are_exported() {
        fn _plugin<T: PluginAdapter>() {}
        fn _platform<T: ChatPlatform>() {}
        fn _ai<T: AiBackend>() {}
        fn _config<T: ConfigStore>() {}
        fn _tx<T: TransactionStore>() {}
        fn _queue<T: JobQueue>() {}
        fn _handler<T: JobResultHandler>() {}
    }
}
