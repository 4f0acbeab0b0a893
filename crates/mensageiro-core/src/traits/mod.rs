// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits reached by the engine.
//!
//! All adapters extend [`PluginAdapter`] and use `#[async_trait]` so they can
//! be held as trait objects.

pub mod adapter;
pub mod ai;
pub mod config_store;
pub mod job_queue;
pub mod platform;
pub mod transaction_store;

pub use adapter::PluginAdapter;
pub use ai::AiBackend;
pub use config_store::ConfigStore;
pub use job_queue::{JobQueue, JobResultHandler};
pub use platform::ChatPlatform;
pub use transaction_store::TransactionStore;
