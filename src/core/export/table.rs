//! Chunked CSV export of result tables
//!
//! A table is read with a single streaming `SELECT *` and written to files of
//! at most `max_rows_per_file` data rows each:
//!
//! ```text
//! {output_dir}/{system}_{table}_0000.csv   rows [0, max)
//! {output_dir}/{system}_{table}_0001.csv   rows [max, 2·max)
//! ...
//! ```
//!
//! Every file starts with the header row. A table without rows still yields
//! `_0000` holding only the header.
//!
//! Rows are handed through a bounded queue to a blocking task that owns the
//! files, so file I/O never runs on the async workers.

use crate::adapters::database::{SqlStore, TextRow};
use crate::domain::{AggregatorError, TableName};
use futures::StreamExt;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

/// Result of exporting one table
///
/// `files` lists every file opened before an error occurred; only a table
/// without `error` has a complete export.
#[derive(Debug)]
pub struct ExportOutcome {
    /// Exported table
    pub table: String,
    /// System label used in the file names
    pub system: String,
    /// Files written, in index order
    pub files: Vec<PathBuf>,
    /// Data rows written
    pub rows: u64,
    /// Why the export stopped early
    pub error: Option<AggregatorError>,
}

impl ExportOutcome {
    fn new(table: &TableName, system: &str) -> Self {
        Self {
            table: table.to_string(),
            system: system.to_string(),
            files: Vec::new(),
            rows: 0,
            error: None,
        }
    }

    fn failed(mut self, error: AggregatorError) -> Self {
        self.error = Some(error);
        self
    }

    /// Whether the table was exported completely
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Serializable view for run summaries
    pub fn report(&self) -> TableExportReport {
        TableExportReport {
            table: self.table.clone(),
            system: self.system.clone(),
            files: self.files.clone(),
            rows: self.rows,
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

/// Serializable summary of an [`ExportOutcome`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableExportReport {
    pub table: String,
    pub system: String,
    pub files: Vec<PathBuf>,
    pub rows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Streams tables into size-bounded CSV files
pub struct TableExporter {
    store: Arc<dyn SqlStore>,
    output_dir: PathBuf,
    max_rows_per_file: u64,
    span: Span,
}

impl TableExporter {
    /// Create an exporter writing into `output_dir`
    ///
    /// A `max_rows_per_file` of zero is treated as one.
    pub fn new(
        store: Arc<dyn SqlStore>,
        output_dir: impl Into<PathBuf>,
        max_rows_per_file: usize,
        span: Span,
    ) -> Self {
        Self {
            store,
            output_dir: output_dir.into(),
            max_rows_per_file: max_rows_per_file.max(1) as u64,
            span,
        }
    }

    /// Output directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File name of chunk `index`
    pub fn chunk_file_name(system: &str, table: &TableName, index: usize) -> String {
        format!("{system}_{table}_{index:04}.csv")
    }

    /// Export `table` into CSV files labelled with `system`
    ///
    /// Never returns an error directly: failures are carried in
    /// [`ExportOutcome::error`] together with the files written so far.
    pub async fn export_table(
        &self,
        table: &TableName,
        system: &str,
        cancel: &CancellationToken,
    ) -> ExportOutcome {
        let span = tracing::info_span!(parent: &self.span, "export", table = %table, system);
        self.export_inner(table, system, cancel)
            .instrument(span)
            .await
    }

    async fn export_inner(
        &self,
        table: &TableName,
        system: &str,
        cancel: &CancellationToken,
    ) -> ExportOutcome {
        let mut outcome = ExportOutcome::new(table, system);
        if cancel.is_cancelled() {
            return outcome.failed(AggregatorError::Cancelled);
        }

        tracing::info!("Exporting table to CSV");
        let started = Instant::now();
        let export_error = |message: String| AggregatorError::Export {
            table: table.to_string(),
            message,
        };

        let query = format!("SELECT * FROM {table}");
        let mut result = match self.store.query(&query).await {
            Ok(result) => result,
            Err(e) => return outcome.failed(export_error(format!("failed to query table: {e}"))),
        };

        let chunks = ChunkWriter {
            output_dir: self.output_dir.clone(),
            max_rows_per_file: self.max_rows_per_file,
            system: system.to_string(),
            table: table.clone(),
            columns: std::mem::take(&mut result.columns),
        };
        let (tx, rx) = mpsc::channel(WRITE_QUEUE);
        let span = Span::current();
        let writer = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            chunks.drain(rx)
        });

        let mut read_error = None;
        while let Some(row) = result.rows.next().await {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            };
            // a closed queue means the writer stopped on an error
            if tx.send(ChunkMessage::Row(row)).await.is_err() {
                break;
            }
        }
        if read_error.is_none() {
            let _ = tx.send(ChunkMessage::End).await;
        }
        drop(tx);

        let written = match writer.await {
            Ok(written) => written,
            Err(e) => return outcome.failed(export_error(format!("CSV writer task failed: {e}"))),
        };
        outcome.files = written.files;
        outcome.rows = written.rows;

        if let Some(message) = written.error {
            return outcome.failed(export_error(message));
        }
        if let Some(e) = read_error {
            return outcome.failed(export_error(format!("failed to read row: {e}")));
        }

        crate::log_export_complete!(table, outcome.files.len(), outcome.rows, started.elapsed());
        outcome
    }
}

/// Rows buffered between the query stream and the file writer
const WRITE_QUEUE: usize = 1024;

enum ChunkMessage {
    Row(TextRow),
    /// The stream ended without error
    End,
}

/// What the writer produced before the queue closed
#[derive(Default)]
struct Written {
    files: Vec<PathBuf>,
    rows: u64,
    error: Option<String>,
}

/// Blocking side of an export: owns the files and the CSV writers
struct ChunkWriter {
    output_dir: PathBuf,
    max_rows_per_file: u64,
    system: String,
    table: TableName,
    columns: Vec<String>,
}

impl ChunkWriter {
    fn drain(self, mut rx: mpsc::Receiver<ChunkMessage>) -> Written {
        let mut written = Written::default();
        if let Err(e) = create_output_dir(&self.output_dir) {
            written.error = Some(format!(
                "failed to create output directory {}: {e}",
                self.output_dir.display()
            ));
            return written;
        }

        let mut writer: Option<csv::Writer<File>> = None;

        while let Some(message) = rx.blocking_recv() {
            let row = match message {
                ChunkMessage::Row(row) => row,
                ChunkMessage::End => {
                    if written.files.is_empty() {
                        match self.open_chunk(0) {
                            Ok((path, chunk)) => {
                                written.files.push(path);
                                writer = Some(chunk);
                            }
                            Err(e) => {
                                written.error = Some(e);
                                return written;
                            }
                        }
                    }
                    break;
                }
            };

            if written.rows % self.max_rows_per_file == 0 {
                if let Err(e) = finish(writer.take()) {
                    written.error = Some(format!("failed to close file: {e}"));
                    return written;
                }
                match self.open_chunk(written.files.len()) {
                    Ok((path, chunk)) => {
                        written.files.push(path);
                        writer = Some(chunk);
                    }
                    Err(e) => {
                        written.error = Some(e);
                        return written;
                    }
                }
            }

            if let Some(chunk) = writer.as_mut() {
                let record = row.iter().map(|value| value.as_deref().unwrap_or(""));
                if let Err(e) = chunk.write_record(record) {
                    finish_quietly(writer.take());
                    written.error = Some(format!("failed to write row: {e}"));
                    return written;
                }
            }
            written.rows += 1;
        }

        if let Err(e) = finish(writer.take()) {
            written.error = Some(format!("failed to close file: {e}"));
        }
        written
    }

    fn open_chunk(&self, index: usize) -> std::result::Result<(PathBuf, csv::Writer<File>), String> {
        let path = self.output_dir.join(TableExporter::chunk_file_name(
            &self.system,
            &self.table,
            index,
        ));
        let file = File::create(&path)
            .map_err(|e| format!("failed to create file {}: {e}", path.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(&self.columns)
            .map_err(|e| format!("failed to write headers to {}: {e}", path.display()))?;
        tracing::debug!(file = %path.display(), index, "Opened export file");
        Ok((path, writer))
    }
}

fn create_output_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o750);
    }
    builder.create(dir)
}

fn finish(writer: Option<csv::Writer<File>>) -> std::io::Result<()> {
    if let Some(mut writer) = writer {
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(e.error().kind(), e.to_string()))?;
        file.sync_all()?;
    }
    Ok(())
}

fn finish_quietly(writer: Option<csv::Writer<File>>) {
    if let Err(e) = finish(writer) {
        tracing::warn!(error = %e, "Failed to close CSV file");
    }
}
