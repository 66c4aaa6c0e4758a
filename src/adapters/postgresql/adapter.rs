//! PostgreSQL adapter implementing [`SqlStore`]
//!
//! Result sets are read through a server-side cursor in batches of
//! `fetch_size` rows using the simple query protocol, so every value arrives
//! already in PostgreSQL's text representation and a table of any size is
//! exported in constant memory.

use crate::adapters::database::traits::{RowStream, SqlStore, TextRow};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::domain::{AggregatorError, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio_postgres::SimpleQueryMessage;

/// Rows fetched per round trip while streaming a result set
pub const DEFAULT_FETCH_SIZE: usize = 10_000;

const CURSOR_NAME: &str = "bda_export_cursor";

/// PostgreSQL implementation of [`SqlStore`]
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
    fetch_size: usize,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient) -> Self {
        Self::new_with_arc(Arc::new(client))
    }

    /// Create a new PostgreSQL adapter with an Arc-wrapped client
    pub fn new_with_arc(client: Arc<PostgreSQLClient>) -> Self {
        Self {
            client,
            fetch_size: DEFAULT_FETCH_SIZE,
        }
    }

    /// Override the cursor batch size
    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl SqlStore for PostgreSQLAdapter {
    async fn ping(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let conn = self.client.get_connection().await?;
        conn.batch_execute(sql)
            .await
            .map_err(|e| AggregatorError::Database(describe_db_error(&e)))
    }

    async fn query(&self, query: &str) -> Result<RowStream> {
        let conn = self.client.get_connection().await?;

        // Prepare only to learn the column names; rows come through the cursor.
        let statement = conn
            .prepare(query)
            .await
            .map_err(|e| AggregatorError::Database(describe_db_error(&e)))?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let mut cursor = Cursor {
            conn: Some(conn),
            fetch_size: self.fetch_size,
            in_transaction: false,
        };
        cursor.open(query).await?;

        let rows = futures::stream::try_unfold(cursor, |mut cursor| async move {
            match cursor.next_batch().await? {
                Some(batch) => Ok::<_, AggregatorError>(Some((batch, cursor))),
                None => Ok(None),
            }
        })
        .map_ok(|batch| futures::stream::iter(batch.into_iter().map(Ok)))
        .try_flatten()
        .boxed();

        Ok(RowStream { columns, rows })
    }
}

/// A server-side cursor holding a pooled connection inside a read-only transaction
struct Cursor {
    conn: Option<deadpool_postgres::Object>,
    fetch_size: usize,
    in_transaction: bool,
}

impl Cursor {
    async fn open(&mut self, query: &str) -> Result<()> {
        self.in_transaction = true;
        self.connection()?
            .batch_execute(&format!(
                "BEGIN READ ONLY; DECLARE {CURSOR_NAME} NO SCROLL CURSOR FOR {query}"
            ))
            .await
            .map_err(|e| AggregatorError::Database(describe_db_error(&e)))
    }

    async fn next_batch(&mut self) -> Result<Option<Vec<TextRow>>> {
        if !self.in_transaction {
            return Ok(None);
        }

        let fetch = format!("FETCH FORWARD {} FROM {CURSOR_NAME}", self.fetch_size);
        let messages = self
            .connection()?
            .simple_query(&fetch)
            .await
            .map_err(|e| AggregatorError::Database(describe_db_error(&e)))?;

        let batch: Vec<TextRow> = messages
            .iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(
                    (0..row.len())
                        .map(|i| row.get(i).map(str::to_string))
                        .collect(),
                ),
                _ => None,
            })
            .collect();

        if batch.is_empty() {
            self.close().await?;
            return Ok(None);
        }
        Ok(Some(batch))
    }

    async fn close(&mut self) -> Result<()> {
        self.connection()?
            .batch_execute(&format!("CLOSE {CURSOR_NAME}; COMMIT"))
            .await
            .map_err(|e| AggregatorError::Database(describe_db_error(&e)))?;
        self.in_transaction = false;
        // Back to the pool with no transaction open
        self.conn = None;
        Ok(())
    }

    fn connection(&self) -> Result<&deadpool_postgres::Object> {
        self.conn
            .as_ref()
            .ok_or_else(|| AggregatorError::Database("Cursor connection already released".into()))
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        // A connection abandoned mid-transaction must not go back to the pool
        if self.in_transaction {
            if let Some(conn) = self.conn.take() {
                drop(deadpool_postgres::Object::take(conn));
            }
        }
    }
}

/// Server message plus detail, without the driver's "db error:" prefix
fn describe_db_error(error: &tokio_postgres::Error) -> String {
    match error.as_db_error() {
        Some(db) => {
            let mut message = format!("{}: {}", db.severity(), db.message());
            if let Some(detail) = db.detail() {
                message.push_str(&format!(" ({detail})"));
            }
            message
        }
        None => error.to_string(),
    }
}
