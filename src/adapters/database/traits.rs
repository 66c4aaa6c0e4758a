//! Relational store abstraction
//!
//! The pipeline treats SQL as opaque text. It needs three things from the
//! store: a liveness check, fire-and-forget statement execution and a
//! streamed, text-rendered result set for the export stage.

use crate::domain::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// One result row, rendered as text; `None` is SQL NULL
pub type TextRow = Vec<Option<String>>;

/// A streamed query result
///
/// Column names are known before the first row is read, so an export of an
/// empty table can still write its header.
pub struct RowStream {
    /// Column names in select order
    pub columns: Vec<String>,

    /// Rows in the order the store returns them
    pub rows: BoxStream<'static, Result<TextRow>>,
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Relational store used by script execution and table export
#[async_trait]
pub trait SqlStore: Send + Sync {
    /// Verify the store is reachable
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::AggregatorError::Connection`] if it is not.
    async fn ping(&self) -> Result<()>;

    /// Execute SQL text without collecting results
    ///
    /// The text may hold several statements when sent as a whole script.
    /// No transaction is opened around the call.
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::AggregatorError::Database`] with the store's message.
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Run a query and stream its rows
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be started; errors while reading
    /// rows surface as items of [`RowStream::rows`].
    async fn query(&self, query: &str) -> Result<RowStream>;
}
