//! Run summary and reporting

use crate::core::export::{TableExportReport, UploadReceipt};
use crate::core::pipeline::stage::Stage;
use crate::core::scripts::ExecutionStats;
use crate::domain::{AggregatorError, Result};
use crate::logging::RunContext;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Not finished yet
    Running,
    /// Reached `Done`
    Succeeded,
    /// Stopped by a fatal error
    Failed,
    /// Stopped by a shutdown signal
    Cancelled,
}

/// What a run did, for logs and the `--summary-json` file
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub client_id: String,
    pub environment: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Last stage entered
    pub stage: Stage,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub init: ExecutionStats,
    /// Systems whose processor ran
    pub systems_processed: Vec<String>,
    /// Configured systems without a processor
    pub systems_skipped: Vec<String>,
    pub exports: Vec<TableExportReport>,
    pub uploads: Vec<UploadReceipt>,
    pub archive: ExecutionStats,
}

impl RunSummary {
    /// Create an empty summary for `run`
    pub fn new(run: &RunContext) -> Self {
        Self {
            run_id: run.run_id,
            client_id: run.client_id.clone(),
            environment: run.environment.clone(),
            started_at: Utc::now(),
            duration_ms: 0,
            stage: Stage::Init,
            status: RunStatus::Running,
            error: None,
            init: ExecutionStats::default(),
            systems_processed: Vec::new(),
            systems_skipped: Vec::new(),
            exports: Vec::new(),
            uploads: Vec::new(),
            archive: ExecutionStats::default(),
        }
    }

    /// Record the outcome of the run
    pub fn finish(&mut self, duration: Duration, error: Option<&AggregatorError>) {
        self.duration_ms = duration.as_millis() as u64;
        self.status = match error {
            None => RunStatus::Succeeded,
            Some(e) if e.is_cancelled() => RunStatus::Cancelled,
            Some(_) => RunStatus::Failed,
        };
        self.error = error.map(ToString::to_string);
    }

    /// Tables whose export failed
    pub fn failed_exports(&self) -> impl Iterator<Item = &TableExportReport> {
        self.exports.iter().filter(|e| e.error.is_some())
    }

    /// Total bytes uploaded
    pub fn uploaded_bytes(&self) -> u64 {
        self.uploads.iter().map(|r| r.bytes).sum()
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            status = ?self.status,
            stage = %self.stage,
            duration_ms = self.duration_ms,
            init_statements = self.init.statements,
            systems_processed = self.systems_processed.len(),
            systems_skipped = self.systems_skipped.len(),
            tables_exported = self.exports.len() - self.failed_exports().count(),
            tables_failed = self.failed_exports().count(),
            files_uploaded = self.uploads.len(),
            bytes_uploaded = self.uploaded_bytes(),
            archive_statements = self.archive.statements,
            "Run finished"
        );

        for failed in self.failed_exports() {
            tracing::warn!(
                table = %failed.table,
                error = failed.error.as_deref().unwrap_or_default(),
                "Table was not exported"
            );
        }
    }

    /// Write the summary as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| {
            AggregatorError::Io(format!("Failed to write summary {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_sets_status() {
        let run = RunContext::new("swb", "prod");

        let mut ok = RunSummary::new(&run);
        ok.finish(Duration::from_millis(1500), None);
        assert_eq!(ok.status, RunStatus::Succeeded);
        assert_eq!(ok.duration_ms, 1500);

        let mut failed = RunSummary::new(&run);
        failed.finish(
            Duration::ZERO,
            Some(&AggregatorError::Database("boom".into()).in_stage("init")),
        );
        assert_eq!(failed.status, RunStatus::Failed);
        assert!(failed.error.unwrap().contains("boom"));

        let mut cancelled = RunSummary::new(&run);
        cancelled.finish(Duration::ZERO, Some(&AggregatorError::Cancelled.in_stage("upload")));
        assert_eq!(cancelled.status, RunStatus::Cancelled);
    }

    #[test]
    fn test_write_json() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("summary.json");

        let mut summary = RunSummary::new(&RunContext::new("swb", "prod"));
        summary.stage = Stage::Done;
        summary.finish(Duration::ZERO, None);
        summary.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "succeeded");
        assert_eq!(value["stage"], "done");
        assert_eq!(value["client_id"], "swb");
        assert!(value.get("error").is_none());
    }
}
