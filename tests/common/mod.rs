//! Shared fixtures for integration tests
//!
//! In-memory [`SqlStore`] and [`ObjectStore`] fakes plus a scoped log capture.

#![allow(dead_code)]

use async_trait::async_trait;
use billing_aggregator::adapters::database::{RowStream, SqlStore, TextRow};
use billing_aggregator::adapters::object_store::ObjectStore;
use billing_aggregator::domain::{AggregatorError, Result};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
struct Table {
    columns: Vec<String>,
    rows: Vec<TextRow>,
    /// Rows returned before the stream yields an error
    fail_after: Option<usize>,
}

/// [`SqlStore`] that records every executed statement
#[derive(Default)]
pub struct RecordingStore {
    executed: Mutex<Vec<String>>,
    queries: Mutex<Vec<String>>,
    tables: Mutex<HashMap<String, Table>>,
    failing_statements: Mutex<Vec<String>>,
    failing_tables: Mutex<HashSet<String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `SELECT * FROM {name}` with these columns and rows
    pub fn with_table(self, name: &str, columns: &[&str], rows: Vec<TextRow>) -> Self {
        self.tables.lock().unwrap().insert(
            name.to_string(),
            Table {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
                fail_after: None,
            },
        );
        self
    }

    /// Like [`RecordingStore::with_table`] but the stream breaks after `fail_after` rows
    pub fn with_broken_table(
        self,
        name: &str,
        columns: &[&str],
        rows: Vec<TextRow>,
        fail_after: usize,
    ) -> Self {
        self.tables.lock().unwrap().insert(
            name.to_string(),
            Table {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
                fail_after: Some(fail_after),
            },
        );
        self
    }

    /// Any executed statement containing `fragment` fails
    pub fn fail_statements_containing(self, fragment: &str) -> Self {
        self.failing_statements
            .lock()
            .unwrap()
            .push(fragment.to_string());
        self
    }

    /// Querying `name` fails before any row is returned
    pub fn fail_table(self, name: &str) -> Self {
        self.failing_tables.lock().unwrap().insert(name.to_string());
        self
    }

    /// Statements passed to `execute`, in call order
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Queries passed to `query`, in call order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlStore for RecordingStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.executed.lock().unwrap().push(sql.to_string());
        let failing = self.failing_statements.lock().unwrap();
        if failing.iter().any(|fragment| sql.contains(fragment.as_str())) {
            return Err(AggregatorError::Database(format!(
                "syntax error at or near \"{}\"",
                sql.split_whitespace().next().unwrap_or_default()
            )));
        }
        Ok(())
    }

    async fn query(&self, query: &str) -> Result<RowStream> {
        self.queries.lock().unwrap().push(query.to_string());

        let name = query.trim_start_matches("SELECT * FROM ").trim();
        if self.failing_tables.lock().unwrap().contains(name) {
            return Err(AggregatorError::Database(format!(
                "permission denied for table {name}"
            )));
        }
        let table = self
            .tables
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| {
                AggregatorError::Database(format!("relation \"{name}\" does not exist"))
            })?;

        let mut items: Vec<Result<TextRow>> = match table.fail_after {
            Some(n) => table.rows.into_iter().take(n).map(Ok).collect(),
            None => table.rows.into_iter().map(Ok).collect(),
        };
        if table.fail_after.is_some() {
            items.push(Err(AggregatorError::Database(
                "connection reset by peer".to_string(),
            )));
        }

        Ok(RowStream {
            columns: table.columns,
            rows: futures::stream::iter(items).boxed(),
        })
    }
}

/// Text row helper: `row(&[Some("1"), None])`
pub fn row(values: &[Option<&str>]) -> TextRow {
    values.iter().map(|v| v.map(str::to_string)).collect()
}

/// [`ObjectStore`] keeping payloads in memory
#[derive(Default)]
pub struct FakeObjectStore {
    objects: Mutex<Vec<(String, Vec<u8>)>>,
    attempts: Mutex<Vec<String>>,
    payloads: Mutex<Vec<Vec<u8>>>,
    failures_left: AtomicUsize,
    failing_keys: Mutex<Vec<String>>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `n` puts fail, whatever their key
    pub fn fail_first(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Every put of a key ending in `suffix` fails
    pub fn always_fail_key(self, suffix: &str) -> Self {
        self.failing_keys.lock().unwrap().push(suffix.to_string());
        self
    }

    /// Successfully stored objects in upload order
    pub fn objects(&self) -> Vec<(String, Vec<u8>)> {
        self.objects.lock().unwrap().clone()
    }

    /// Keys of every put, successful or not
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    /// Bytes received by every put, successful or not
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, key: &str) -> usize {
        self.attempts().iter().filter(|k| k.as_str() == key).count()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn put_object(&self, key: &str, mut body: File, length: u64) -> Result<()> {
        self.attempts.lock().unwrap().push(key.to_string());

        let mut payload = Vec::new();
        body.read_to_end(&mut payload)
            .await
            .map_err(|e| AggregatorError::Io(e.to_string()))?;
        assert_eq!(payload.len() as u64, length, "declared length of {key}");
        self.payloads.lock().unwrap().push(payload.clone());

        if self
            .failing_keys
            .lock()
            .unwrap()
            .iter()
            .any(|suffix| key.ends_with(suffix.as_str()))
        {
            return Err(AggregatorError::ObjectStore(format!(
                "Failed to upload s3://test/{key}: service unavailable"
            )));
        }

        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(AggregatorError::ObjectStore(format!(
                "Failed to upload s3://test/{key}: timeout"
            )));
        }

        self.objects.lock().unwrap().push((key.to_string(), payload));
        Ok(())
    }

    fn location(&self) -> String {
        "memory://test".to_string()
    }
}

/// Captured log output
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Number of lines containing `needle`
    pub fn count(&self, needle: &str) -> usize {
        self.contents()
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }
}

pub struct LogWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter(self.0.clone())
    }
}

/// Route logs of the current thread into a buffer until the guard drops
pub fn capture_logs() -> (DefaultGuard, LogBuffer) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    (tracing::subscriber::set_default(subscriber), buffer)
}

/// Write `content` to `root/relative`, creating parent directories
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Read a CSV file back as records, header included
pub fn read_csv(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|record| record.unwrap().iter().map(str::to_string).collect())
        .collect()
}
