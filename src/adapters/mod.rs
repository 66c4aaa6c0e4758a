//! External system integrations.
//!
//! - [`database`] - Relational store abstraction ([`database::SqlStore`])
//! - [`postgresql`] - PostgreSQL implementation backed by a deadpool pool
//! - [`object_store`] - Remote object storage ([`object_store::ObjectStore`]) and its S3 implementation
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies behind traits so the pipeline can
//! be exercised against in-memory implementations.
//!
//! ```rust,no_run
//! use billing_aggregator::adapters::database::create_sql_store;
//! use billing_aggregator::adapters::object_store::S3ObjectStore;
//! use billing_aggregator::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(None::<&str>)?;
//! let store = create_sql_store(&config.database)?;
//! store.ping().await?;
//!
//! let bucket = S3ObjectStore::from_config(&config.s3).await;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod object_store;
pub mod postgresql;
