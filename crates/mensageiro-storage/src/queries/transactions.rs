// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transaction rows, history entries and the delivered archive.

use rusqlite::{OptionalExtension, Row, params};

use mensageiro_core::{HistoryEntry, MensageiroError, RecoveryData, Transaction, TransactionStatus};

use crate::database::{Database, from_sql_time, map_tr_err, parse_column, to_sql_time};

const SELECT_TRANSACTION: &str = "SELECT id, message_id, chat_id, sender_id, kind, status, attempts,
        recipient_id, recovery_chat_id, response, last_error, created_at, last_updated
     FROM transactions";

fn row_to_transaction(row: &Row<'_>) -> Result<Transaction, rusqlite::Error> {
    let kind: String = row.get(4)?;
    let status: String = row.get(5)?;
    let recipient_id: Option<String> = row.get(7)?;
    let recovery_chat_id: Option<String> = row.get(8)?;
    let created_at: String = row.get(11)?;
    let last_updated: String = row.get(12)?;

    let recovery_data = match (recipient_id, recovery_chat_id) {
        (Some(recipient_id), Some(chat_id)) => Some(RecoveryData {
            recipient_id,
            chat_id,
        }),
        _ => None,
    };

    Ok(Transaction {
        id: row.get(0)?,
        message_id: row.get(1)?,
        chat_id: row.get(2)?,
        sender_id: row.get(3)?,
        kind: parse_column(4, &kind)?,
        status: parse_column(5, &status)?,
        attempts: row.get(6)?,
        history: Vec::new(),
        recovery_data,
        response: row.get(9)?,
        last_error: row.get(10)?,
        created_at: from_sql_time(11, &created_at)?,
        last_updated: from_sql_time(12, &last_updated)?,
    })
}

fn load_history(
    conn: &rusqlite::Connection,
    transaction_id: &str,
) -> Result<Vec<HistoryEntry>, rusqlite::Error> {
    let mut stmt = conn.prepare_cached(
        "SELECT timestamp, status, detail FROM transaction_history
         WHERE transaction_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![transaction_id], |row| {
        let timestamp: String = row.get(0)?;
        let status: String = row.get(1)?;
        Ok(HistoryEntry {
            timestamp: from_sql_time(0, &timestamp)?,
            status: parse_column(1, &status)?,
            detail: row.get(2)?,
        })
    })?;
    rows.collect()
}

fn append_history(
    conn: &rusqlite::Connection,
    transaction_id: &str,
    entries: &[HistoryEntry],
) -> Result<(), rusqlite::Error> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO transaction_history (transaction_id, timestamp, status, detail)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for entry in entries {
        stmt.execute(params![
            transaction_id,
            to_sql_time(&entry.timestamp),
            entry.status.to_string(),
            entry.detail,
        ])?;
    }
    Ok(())
}

/// Active transaction with its full history.
fn load(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<Transaction>, rusqlite::Error> {
    let found = conn
        .query_row(
            &format!("{SELECT_TRANSACTION} WHERE id = ?1"),
            params![id],
            row_to_transaction,
        )
        .optional()?;
    match found {
        Some(mut tx) => {
            tx.history = load_history(conn, &tx.id)?;
            Ok(Some(tx))
        }
        None => Ok(None),
    }
}

fn load_where(
    conn: &rusqlite::Connection,
    filter: &str,
) -> Result<Vec<Transaction>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_TRANSACTION} {filter} ORDER BY created_at ASC, id ASC"
    ))?;
    let mut transactions = stmt
        .query_map([], row_to_transaction)?
        .collect::<Result<Vec<_>, _>>()?;
    for tx in &mut transactions {
        tx.history = load_history(conn, &tx.id)?;
    }
    Ok(transactions)
}

pub async fn insert(db: &Database, tx: &Transaction) -> Result<(), MensageiroError> {
    let tx = tx.clone();
    db.connection()
        .call(move |conn| {
            let sql_tx = conn.transaction()?;
            sql_tx.execute(
                "INSERT INTO transactions (id, message_id, chat_id, sender_id, kind, status,
                    attempts, recipient_id, recovery_chat_id, response, last_error,
                    created_at, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    tx.id,
                    tx.message_id,
                    tx.chat_id,
                    tx.sender_id,
                    tx.kind.to_string(),
                    tx.status.to_string(),
                    tx.attempts,
                    tx.recovery_data.as_ref().map(|r| r.recipient_id.clone()),
                    tx.recovery_data.as_ref().map(|r| r.chat_id.clone()),
                    tx.response,
                    tx.last_error,
                    to_sql_time(&tx.created_at),
                    to_sql_time(&tx.last_updated),
                ],
            )?;
            append_history(&sql_tx, &tx.id, &tx.history)?;
            sql_tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<Transaction>, MensageiroError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| load(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// All active transactions, oldest first.
pub async fn list_active(db: &Database) -> Result<Vec<Transaction>, MensageiroError> {
    db.connection()
        .call(|conn| load_where(conn, ""))
        .await
        .map_err(map_tr_err)
}

/// Rows that can satisfy the recoverable predicate; callers still filter with
/// [`Transaction::is_recoverable`].
pub async fn list_recovery_candidates(db: &Database) -> Result<Vec<Transaction>, MensageiroError> {
    db.connection()
        .call(|conn| {
            load_where(
                conn,
                "WHERE status IN ('processing', 'response_ready', 'temp_failure')
                   AND response IS NOT NULL AND recipient_id IS NOT NULL",
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Loads an active transaction, applies `apply`, and persists the result in
/// one SQLite transaction. Delivered transactions are moved to the archive.
///
/// Returns the affected count and the transaction as it is after the call.
pub async fn update<F>(
    db: &Database,
    id: &str,
    apply: F,
) -> Result<(usize, Option<Transaction>), MensageiroError>
where
    F: FnOnce(&mut Transaction) -> bool + Send + 'static,
{
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql_tx = conn.transaction()?;
            let Some(mut tx) = load(&sql_tx, &id)? else {
                return Ok((0, None));
            };
            let seen = tx.history.len();
            if !apply(&mut tx) {
                return Ok((0, Some(tx)));
            }

            if tx.status == TransactionStatus::Delivered {
                sql_tx.execute(
                    "INSERT OR REPLACE INTO delivered_transactions
                        (id, message_id, chat_id, sender_id, kind, attempts, response,
                         created_at, delivered_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        tx.id,
                        tx.message_id,
                        tx.chat_id,
                        tx.sender_id,
                        tx.kind.to_string(),
                        tx.attempts,
                        tx.response,
                        to_sql_time(&tx.created_at),
                        to_sql_time(&tx.last_updated),
                    ],
                )?;
                sql_tx.execute("DELETE FROM transactions WHERE id = ?1", params![tx.id])?;
            } else {
                sql_tx.execute(
                    "UPDATE transactions SET status = ?2, attempts = ?3, recipient_id = ?4,
                        recovery_chat_id = ?5, response = ?6, last_error = ?7, last_updated = ?8
                     WHERE id = ?1",
                    params![
                        tx.id,
                        tx.status.to_string(),
                        tx.attempts,
                        tx.recovery_data.as_ref().map(|r| r.recipient_id.clone()),
                        tx.recovery_data.as_ref().map(|r| r.chat_id.clone()),
                        tx.response,
                        tx.last_error,
                        to_sql_time(&tx.last_updated),
                    ],
                )?;
            }
            append_history(&sql_tx, &tx.id, &tx.history[seen..])?;
            sql_tx.commit()?;
            Ok((1, Some(tx)))
        })
        .await
        .map_err(map_tr_err)
}

/// Whether a transaction id is present in the delivered archive.
pub async fn is_archived(db: &Database, id: &str) -> Result<bool, MensageiroError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM delivered_transactions WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Full history of a transaction, including delivered ones.
pub async fn history(db: &Database, id: &str) -> Result<Vec<HistoryEntry>, MensageiroError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| load_history(conn, &id))
        .await
        .map_err(map_tr_err)
}
