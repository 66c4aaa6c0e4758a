// Billing Aggregator - billing data aggregation and export
// Copyright (c) 2025 Billing Aggregator Contributors
// Licensed under the MIT License

//! # Billing Aggregator
//!
//! Batch job that prepares billing data in PostgreSQL with SQL scripts,
//! exports the per-system result tables to CSV and uploads them to S3.
//!
//! ## Overview
//!
//! A run walks through a fixed sequence of stages:
//!
//! 1. **Init** - execute the init phase scripts of every system
//! 2. **Per-system processing** - run each configured system's processor
//! 3. **Export** - stream `{system}_results` into size-bounded CSV files
//! 4. **Upload** - ship the files to `{client_id}/{environment}/` with retries
//! 5. **Archive** - execute the archive phase scripts
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Scripts, processors, export and the pipeline stage machine
//! - [`adapters`] - PostgreSQL and S3 integrations behind traits
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration loading and validation
//! - [`logging`] - Structured logging and the per-run span
//!
//! ## Quick Start
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
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config(None::<&str>)?;
//!     let store = create_sql_store(&config.database)?;
//!     let object_store = Arc::new(S3ObjectStore::from_config(&config.s3).await);
//!
//!     let pipeline =
//!         Pipeline::from_config(&config, store, object_store, RunContext::from_config(&config))?;
//!     let summary = pipeline.run(&CancellationToken::new()).await?;
//!
//!     println!("Uploaded {} file(s)", summary.uploads.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::Result`]. Fatal pipeline
//! errors are wrapped with the stage they stopped, and
//! [`domain::AggregatorError::exit_code`] maps them to the process exit code.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
