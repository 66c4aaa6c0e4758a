//! PostgreSQL integration
//!
//! [`PostgreSQLClient`] owns the connection pool; [`PostgreSQLAdapter`]
//! implements [`crate::adapters::database::SqlStore`] on top of it.

pub mod adapter;
pub mod client;

pub use adapter::{PostgreSQLAdapter, DEFAULT_FETCH_SIZE};
pub use client::PostgreSQLClient;
