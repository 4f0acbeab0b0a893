// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mensageiro - message orchestration and transaction recovery for chat bots.

mod recover;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mensageiro_config::MensageiroConfig;

/// Mensageiro - answers chat messages through an AI backend and never loses a reply.
#[derive(Parser, Debug)]
#[command(name = "mensageiro", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the engine: gateway, dispatcher, media queues and recovery.
    Serve,
    /// Run one recovery pass over undelivered responses and exit.
    Recover,
    /// List active transactions.
    Status {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Validate the configuration and exit.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> MensageiroConfig {
    let loaded = match path {
        Some(path) => mensageiro_config::load_and_validate_path(path),
        None => mensageiro_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            mensageiro_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Recover) => recover::run_recover(config).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::CheckConfig) => {
            println!(
                "mensageiro: configuration OK (bot.name={}, prefix={:?}, database={})",
                config.bot.name, config.bot.command_prefix, config.storage.database_path
            );
            Ok(())
        }
        None => {
            println!("mensageiro: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
