//! Configuration management for the billing aggregator.
//!
//! # Overview
//!
//! Configuration comes from an optional TOML file plus `BDA_*` environment
//! variables, with support for:
//! - Environment variable substitution (`${VAR_NAME}`) inside the file
//! - Environment overrides for every deployment-relevant setting
//! - Defaults that depend on the detected environment (`ED4ENV`, AWS Batch)
//! - Validation before anything touches the database
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use billing_aggregator::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(Some("billing-aggregator.toml"))?;
//!
//! println!("Systems: {:?}", config.pipeline.systems);
//! println!("Remote prefix: {}", config.remote_prefix());
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! client_id = "swb"
//!
//! [database]
//! host = "octopus.internal"
//! password = "${BDA_DB_PASSWORD}"
//!
//! [s3]
//! bucket = "billing-exports"
//!
//! [pipeline]
//! systems = ["tripica", "bookkeeper"]
//! ignore_systems = []
//!
//! [export]
//! max_rows_per_file = 1000000
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_with};
pub use schema::{
    detect_environment, AggregatorConfig, ApplicationConfig, DatabaseConfig, ExportConfig,
    LoggingConfig, PipelineConfig, S3Config, ScriptsConfig, UploadConfig, LOCAL_ENVIRONMENT,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
