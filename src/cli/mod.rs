//! CLI interface and argument parsing
//!
//! Every command returns the process exit code:
//!
//! | code | meaning                     |
//! |------|-----------------------------|
//! | 0    | success                     |
//! | 2    | configuration error         |
//! | 4    | connectivity error          |
//! | 5    | any other fatal error       |
//! | 130  | cancelled by SIGINT/SIGTERM |

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Billing Aggregator - runs billing SQL scripts and ships the results to S3
#[derive(Parser, Debug)]
#[command(name = "billing-aggregator")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to an optional TOML configuration file; `BDA_*` variables override it
    #[arg(short, long, env = "BDA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the aggregation pipeline
    Run(commands::run::RunArgs),

    /// Load and validate the configuration, then exit
    ValidateConfig(commands::validate::ValidateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::try_parse_from(["billing-aggregator", "run"]).unwrap();
        assert!(matches!(cli.command, Commands::Run(_)));
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli =
            Cli::try_parse_from(["billing-aggregator", "--config", "custom.toml", "run"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli =
            Cli::try_parse_from(["billing-aggregator", "--log-level", "debug", "run"]).unwrap();
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_summary_json() {
        let cli = Cli::try_parse_from([
            "billing-aggregator",
            "run",
            "--summary-json",
            "/tmp/summary.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.summary_json, Some(PathBuf::from("/tmp/summary.json")))
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::try_parse_from(["billing-aggregator", "validate-config"]).unwrap();
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["billing-aggregator"]).is_err());
    }
}
