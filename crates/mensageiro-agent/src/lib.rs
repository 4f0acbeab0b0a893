// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message orchestration for Mensageiro.
//!
//! - [`MessageDispatcher`] deduplicates, classifies and routes inbound events,
//!   tracks each answerable message as a transaction and delivers the answer.
//! - [`RecoveryCoordinator`] redelivers answers that were produced but never
//!   reached the user, at startup and whenever the store signals a failure.
//! - [`shutdown::install_signal_handler`] turns SIGINT/SIGTERM into a
//!   cancellation token.

pub mod classify;
pub mod commands;
pub mod dedup;
pub mod dispatcher;
pub mod recovery;
pub mod replies;
pub mod shutdown;

pub use commands::{CommandHandler, CommandReply};
pub use dedup::DedupCache;
pub use dispatcher::{DispatcherConfig, MessageDispatcher};
pub use recovery::{RecoveryCoordinator, RecoveryOutcome, RecoveryReport};
