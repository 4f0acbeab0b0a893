// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mensageiro status` command implementation.
//!
//! Lists the active transactions of the SQLite ledger, oldest first.

use std::io::IsTerminal;

use serde::Serialize;

use mensageiro_config::MensageiroConfig;
use mensageiro_core::{MensageiroError, Transaction, TransactionStatus, TransactionStore};
use mensageiro_storage::{Database, SqliteTransactionStore};

/// One row of `--json` output.
#[derive(Debug, Serialize)]
pub struct StatusRow {
    pub id: String,
    pub chat_id: String,
    pub kind: String,
    pub status: String,
    pub attempts: u32,
    pub recoverable: bool,
    pub last_error: Option<String>,
    pub last_updated: String,
}

impl From<&Transaction> for StatusRow {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.clone(),
            chat_id: tx.chat_id.clone(),
            kind: tx.kind.to_string(),
            status: tx.status.to_string(),
            attempts: tx.attempts,
            recoverable: tx.is_recoverable(),
            last_error: tx.last_error.clone(),
            last_updated: tx.last_updated.to_rfc3339(),
        }
    }
}

pub async fn run_status(
    config: &MensageiroConfig,
    json: bool,
    plain: bool,
) -> Result<(), MensageiroError> {
    let db = Database::open(&config.storage).await?;
    let store = SqliteTransactionStore::new(db, config.transactions.max_attempts);
    let active = store.list_active().await?;
    let rows: Vec<StatusRow> = active.iter().map(StatusRow::from).collect();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_table(&active, use_color);
    }
    Ok(())
}

fn print_table(active: &[Transaction], use_color: bool) {
    println!();
    println!("  mensageiro status");
    println!("  {}", "-".repeat(35));

    if active.is_empty() {
        println!("    No active transactions.");
        println!();
        return;
    }

    for tx in active {
        println!(
            "    {}  {:<6} {:<18} attempts={} chat={}",
            tx.id,
            tx.kind,
            render_status(tx.status, use_color),
            tx.attempts,
            tx.chat_id
        );
        if let Some(error) = &tx.last_error {
            println!("      last error: {error}");
        }
    }
    println!();
    println!("    {} active", active.len());
    println!();
}

fn render_status(status: TransactionStatus, use_color: bool) -> String {
    let label = status.to_string();
    if !use_color {
        return label;
    }
    use colored::Colorize;
    match status {
        TransactionStatus::PermanentFailure => label.red().to_string(),
        TransactionStatus::TempFailure => label.yellow().to_string(),
        TransactionStatus::Delivered => label.green().to_string(),
        _ => label,
    }
}

#[cfg(test)]
mod tests {
    use mensageiro_core::{ChatInfo, EventKind, InboundEvent, MessageKind};

    use super::*;

    fn transaction() -> Transaction {
        let event = InboundEvent {
            id: "m1".into(),
            from: "55@c.us".into(),
            author: None,
            body: "oi".into(),
            has_media: false,
            kind: EventKind::Chat,
            has_quoted_msg: false,
            timestamp: 0,
        };
        let chat = ChatInfo {
            id: "55@c.us".into(),
            name: None,
            is_group: false,
        };
        Transaction::new(&event, &chat, MessageKind::Text)
    }

    #[test]
    fn row_serializes_status_and_kind() {
        let row = StatusRow::from(&transaction());
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("\"status\":\"created\""));
        assert!(json.contains("\"kind\":\"text\""));
        assert!(json.contains("\"recoverable\":false"));
    }

    #[test]
    fn plain_status_has_no_escape_codes() {
        assert_eq!(
            render_status(TransactionStatus::PermanentFailure, false),
            "permanent_failure"
        );
    }
}
