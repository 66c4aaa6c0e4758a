//! Core business logic of the billing aggregator.
//!
//! # Modules
//!
//! - [`scripts`] - SQL script discovery, statement splitting and execution
//! - [`processors`] - Per-system processors and their registry
//! - [`export`] - Chunked CSV export and upload to object storage
//! - [`pipeline`] - The stage machine that ties a run together
//!
//! # Run Workflow
//!
//! 1. **Init**: execute `{scripts_root}/init/{system}/**/*.sql`
//! 2. **Process**: run each configured system's processor
//! 3. **Export**: write `{system}_results` to CSV chunks
//! 4. **Upload**: ship the chunks to `{client_id}/{environment}/` in the bucket
//! 5. **Archive**: execute `{scripts_root}/archive/{system}/**/*.sql`
//!
//! # Example
//!
//! ```rust,no_run
//! use billing_aggregator::adapters::database::create_sql_store;
//! use billing_aggregator::adapters::object_store::S3ObjectStore;
//! use billing_aggregator::config::load_config;
//! use billing_aggregator::core::pipeline::Pipeline;
//! use billing_aggregator::logging::RunContext;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(Some("billing-aggregator.toml"))?;
//! let store = create_sql_store(&config.database)?;
//! let object_store = Arc::new(S3ObjectStore::from_config(&config.s3).await);
//!
//! let run = RunContext::from_config(&config);
//! let pipeline = Pipeline::from_config(&config, store, object_store, run)?;
//! let summary = pipeline.run(&CancellationToken::new()).await?;
//!
//! println!("Uploaded {} file(s)", summary.uploads.len());
//! # Ok(())
//! # }
//! ```

pub mod export;
pub mod pipeline;
pub mod processors;
pub mod scripts;
