//! Validate config command implementation
//!
//! Loads the configuration exactly as `run` would (file, `${VAR}`
//! substitution, `BDA_*` overrides, validation) and prints what it resolved to.

use crate::config::{load_config, AggregatorConfig};
use clap::Args;
use std::path::Path;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: Option<&Path>) -> anyhow::Result<i32> {
        match config_path {
            Some(path) => println!("Validating configuration file: {}", path.display()),
            None => println!("Validating configuration from environment"),
        }
        println!();

        match load_config(config_path) {
            Ok(config) => {
                println!("Configuration is valid");
                println!();
                print_config(&config);
                Ok(0)
            }
            Err(e) => {
                println!("Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(e.exit_code())
            }
        }
    }
}

fn print_config(config: &AggregatorConfig) {
    println!("Configuration Summary:");
    println!("  Client ID: {}", config.client_id);
    println!("  Environment: {}", config.environment);
    println!("  Log Level: {}", config.application.log_level);
    println!(
        "  Database: {}:{}/{} as {} (ssl: {})",
        config.database.host,
        config.database.port,
        config.database.name,
        config.database.user,
        config.database.ssl_mode
    );
    println!("  Max Connections: {}", config.database.max_connections);
    println!("  S3 Bucket: {} ({})", config.s3.bucket, config.s3.region);
    if let Some(endpoint) = &config.s3.endpoint {
        println!("  S3 Endpoint: {endpoint}");
    }
    println!("  Remote Prefix: {}", config.remote_prefix());
    println!("  Systems: {:?}", config.pipeline.systems);
    if !config.pipeline.ignore_systems.is_empty() {
        println!("  Ignored Systems: {:?}", config.pipeline.ignore_systems);
    }
    println!("  Scripts: {}", config.scripts.root_dir.display());
    println!("  Output Directory: {}", config.export.output_dir.display());
    println!("  Max Rows per File: {}", config.export.max_rows_per_file);
    println!("  Upload Attempts: {}", config.upload.max_attempts);
    println!();
}
