// Billing Aggregator - billing data aggregation and export
// Copyright (c) 2025 Billing Aggregator Contributors
// Licensed under the MIT License

use billing_aggregator::cli::{Cli, Commands};
use clap::Parser;
use std::process;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    let exit_code = match execute_command(&cli, cancel).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e}");
            5
        }
    };

    process::exit(exit_code);
}

async fn execute_command(cli: &Cli, cancel: CancellationToken) -> anyhow::Result<i32> {
    let config_path = cli.config.as_deref();
    match &cli.command {
        Commands::Run(args) => {
            args.execute(config_path, cli.log_level.as_deref(), cancel)
                .await
        }
        Commands::ValidateConfig(args) => args.execute(config_path).await,
    }
}

/// Cancels `cancel` on SIGINT or SIGTERM
async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received SIGINT, cancelling run");
                    cancel.cancel();
                }
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, cancelling run");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, cancelling run");
            }
        }
        eprintln!("Shutdown signal received, stopping after the current step...");
        cancel.cancel();
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        } else {
            tracing::info!("Received SIGINT, cancelling run");
            eprintln!("Shutdown signal received, stopping after the current step...");
            cancel.cancel();
        }
    }
}
