// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite connection handle.
//!
//! All statements run on the single background thread owned by
//! `tokio-rusqlite`, so the `Database` is the only writer. Do not open extra
//! connections for writes.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use mensageiro_config::model::StorageConfig;
use mensageiro_core::MensageiroError;

use crate::migrations::run_migrations;

/// Maps tokio-rusqlite call errors into the storage variant.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> MensageiroError {
    MensageiroError::storage(e.to_string())
}

/// Cheap-to-clone handle to the migrated database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (or creates) the database file, applies PRAGMAs and migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, MensageiroError> {
        let path = Path::new(&config.database_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| MensageiroError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| MensageiroError::storage(e.to_string()))?;
        let db = Self::prepare(conn, config.wal_mode).await?;
        info!(path = %config.database_path, wal = config.wal_mode, "database opened");
        Ok(db)
    }

    /// Private in-memory database, used by tests and one-shot tooling.
    pub async fn open_in_memory() -> Result<Self, MensageiroError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| MensageiroError::storage(e.to_string()))?;
        Self::prepare(conn, false).await
    }

    async fn prepare(
        conn: tokio_rusqlite::Connection,
        wal_mode: bool,
    ) -> Result<Self, MensageiroError> {
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| Ok::<_, rusqlite::Error>(run_migrations(conn)))
            .await
            .map_err(map_tr_err)??;
        debug!("migrations applied");

        Ok(Self { conn })
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Flushes the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), MensageiroError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn ping(&self) -> Result<(), MensageiroError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

pub(crate) fn to_sql_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339()
}

/// Parses a stored RFC 3339 timestamp inside a row mapper.
pub(crate) fn from_sql_time(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parses a stored enum column inside a row mapper.
pub(crate) fn parse_column<T>(idx: usize, raw: &str) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_file_and_parent_dirs() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("mensageiro.db");
        let config = StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
        };
        let db = Database::open(&config).await.unwrap();
        db.ping().await.unwrap();
        db.checkpoint().await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn reopening_skips_applied_migrations() {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("twice.db").to_string_lossy().into_owned(),
            wal_mode: false,
        };
        drop(Database::open(&config).await.unwrap());
        let db = Database::open(&config).await.unwrap();
        let tables: i64 = db
            .connection()
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('transactions', 'transaction_history',
                                  'delivered_transactions', 'chat_config', 'named_prompts')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(tables, 5);
    }

    #[test]
    fn timestamps_round_trip() {
        let now = Utc::now();
        let parsed = from_sql_time(0, &to_sql_time(&now)).unwrap();
        assert_eq!(parsed, now);
    }
}
