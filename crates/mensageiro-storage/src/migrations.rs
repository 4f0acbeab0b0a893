// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations.
//!
//! The SQL files under `migrations/` are compiled into the binary and applied
//! on every open; refinery records what already ran in
//! `refinery_schema_history`.

use mensageiro_core::MensageiroError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), MensageiroError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| MensageiroError::storage(format!("migration failed: {e}")))?;
    for migration in report.applied_migrations() {
        tracing::debug!(version = migration.version(), name = migration.name(), "migration applied");
    }
    Ok(())
}
