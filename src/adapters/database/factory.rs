//! Store factory
//!
//! Builds the [`SqlStore`] the pipeline runs against from configuration.

use crate::adapters::database::traits::SqlStore;
use crate::adapters::postgresql::{PostgreSQLAdapter, PostgreSQLClient};
use crate::config::schema::DatabaseConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Create the relational store client
///
/// No connection is opened here; connectivity is verified separately.
///
/// # Errors
///
/// Returns an error if the connection pool cannot be built
pub fn create_sql_store(config: &DatabaseConfig) -> Result<Arc<dyn SqlStore>> {
    let client = PostgreSQLClient::new(config.clone())?;
    tracing::info!(
        target_db = %client.connection_string_safe(),
        "Creating PostgreSQL client"
    );
    Ok(Arc::new(PostgreSQLAdapter::new(client)))
}
