// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence for Mensageiro.
//!
//! WAL-mode SQLite with embedded migrations behind a single `tokio-rusqlite`
//! writer, plus in-memory equivalents of the same stores.

pub mod config_store;
pub mod database;
pub mod memory;
pub mod migrations;
pub mod queries;
pub mod transaction_store;

pub use config_store::SqliteConfigStore;
pub use database::Database;
pub use memory::{MemoryConfigStore, MemoryTransactionStore};
pub use transaction_store::SqliteTransactionStore;
