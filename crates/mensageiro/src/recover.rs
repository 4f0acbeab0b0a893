// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mensageiro recover` command implementation.
//!
//! One recovery pass over the SQLite ledger, delivering through the gateway's
//! outbound bridge. The inbound server is not started.

use std::sync::Arc;
use std::time::Duration;

use mensageiro_agent::{RecoveryCoordinator, RecoveryReport};
use mensageiro_config::MensageiroConfig;
use mensageiro_core::{MensageiroError, PluginAdapter, TransactionStore};
use mensageiro_gateway::GatewayPlatform;
use mensageiro_storage::{Database, SqliteTransactionStore};

use crate::serve::init_tracing;

pub async fn run_recover(config: MensageiroConfig) -> Result<(), MensageiroError> {
    init_tracing(&config.bot.log_level);

    if config.gateway.outbound_url.is_none() {
        return Err(MensageiroError::Config(
            "gateway.outbound_url is required to redeliver responses".to_string(),
        ));
    }

    let db = Database::open(&config.storage).await?;
    let transactions: Arc<dyn TransactionStore> = Arc::new(SqliteTransactionStore::new(
        db.clone(),
        config.transactions.max_attempts,
    ));
    let platform = Arc::new(GatewayPlatform::new(
        config.gateway.clone(),
        config.bot.bot_id.clone(),
    )?);

    let coordinator = RecoveryCoordinator::new(
        platform.clone(),
        transactions,
        Duration::from_secs(config.transactions.recovery_retry_delay_secs),
    );
    let report = coordinator.recover_pending().await?;
    println!("{}", summary(&report));

    platform.shutdown().await?;
    db.checkpoint().await?;
    Ok(())
}

fn summary(report: &RecoveryReport) -> String {
    if report.attempted == 0 {
        return "mensageiro: nothing to recover".to_string();
    }
    format!(
        "mensageiro: {} attempted, {} delivered, {} will retry, {} abandoned",
        report.attempted, report.delivered, report.failed, report.abandoned
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pass_is_reported_plainly() {
        assert_eq!(summary(&RecoveryReport::default()), "mensageiro: nothing to recover");
    }

    #[test]
    fn summary_lists_every_outcome() {
        let report = RecoveryReport {
            attempted: 4,
            delivered: 2,
            failed: 1,
            abandoned: 1,
        };
        assert_eq!(
            summary(&report),
            "mensageiro: 4 attempted, 2 delivered, 1 will retry, 1 abandoned"
        );
    }
}
