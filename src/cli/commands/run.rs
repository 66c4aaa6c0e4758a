//! Run command implementation
//!
//! Loads configuration, initializes logging, verifies database connectivity
//! and drives the pipeline through all of its stages.

use crate::adapters::database::{create_sql_store, schedule_from_secs, verify_connectivity};
use crate::adapters::object_store::{ObjectStore, S3ObjectStore};
use crate::config::load_config;
use crate::core::pipeline::{Pipeline, RunSummary};
use crate::domain::AggregatorError;
use crate::logging::{init_logging, RunContext};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Write the run summary as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub summary_json: Option<PathBuf>,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: Option<&Path>,
        log_level: Option<&str>,
        cancel: CancellationToken,
    ) -> anyhow::Result<i32> {
        let mut config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(e.exit_code());
            }
        };
        if let Some(level) = log_level {
            config.application.log_level = level.to_string();
        }

        let _guard = match init_logging(&config.application, &config.logging) {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Failed to initialize logging: {e}");
                return Ok(e.exit_code());
            }
        };

        let run = RunContext::from_config(&config);
        let span = run.span();
        tracing::info!(
            parent: &span,
            version = env!("CARGO_PKG_VERSION"),
            systems = ?config.pipeline.systems,
            "Billing aggregator starting"
        );

        let store = match create_sql_store(&config.database) {
            Ok(store) => store,
            Err(e) => return Ok(fail(&e)),
        };

        let schedule = schedule_from_secs(&config.database.connect_retry_schedule_secs);
        if let Err(e) = verify_connectivity(store.as_ref(), &schedule, &cancel)
            .instrument(span.clone())
            .await
        {
            return Ok(fail(&e));
        }

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(S3ObjectStore::from_config(&config.s3).await);
        tracing::info!(parent: &span, destination = %object_store.location(), "Object store ready");

        let pipeline = match Pipeline::from_config(&config, store, object_store, run) {
            Ok(pipeline) => pipeline,
            Err(e) => return Ok(fail(&e)),
        };

        let (summary, result) = pipeline.execute(&cancel).await;
        summary.log_summary();
        print_summary(&summary);

        if let Some(path) = &self.summary_json {
            match summary.write_json(path) {
                Ok(()) => tracing::info!(path = %path.display(), "Summary written"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to write summary");
                    eprintln!("Failed to write summary: {e}");
                }
            }
        }

        Ok(match result {
            Ok(()) => 0,
            Err(e) => fail(&e),
        })
    }
}

fn fail(error: &AggregatorError) -> i32 {
    if error.is_cancelled() {
        eprintln!("Run cancelled: {error}");
    } else {
        eprintln!("Run failed: {error}");
    }
    error.exit_code()
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Run Summary:");
    println!("  Run ID: {}", summary.run_id);
    println!("  Status: {:?}", summary.status);
    println!("  Stage reached: {}", summary.stage);
    println!(
        "  Init: {} script(s), {} statement(s)",
        summary.init.scripts, summary.init.statements
    );
    println!("  Systems processed: {:?}", summary.systems_processed);
    if !summary.systems_skipped.is_empty() {
        println!("  Systems skipped: {:?}", summary.systems_skipped);
    }
    for export in &summary.exports {
        match &export.error {
            None => println!(
                "  Exported {}: {} row(s) in {} file(s)",
                export.table,
                export.rows,
                export.files.len()
            ),
            Some(error) => println!("  Export of {} failed: {error}", export.table),
        }
    }
    println!(
        "  Uploaded: {} file(s), {} byte(s)",
        summary.uploads.len(),
        summary.uploaded_bytes()
    );
    println!(
        "  Archive: {} script(s), {} statement(s)",
        summary.archive.scripts, summary.archive.statements
    );
    println!("  Duration: {:.2}s", summary.duration_ms as f64 / 1000.0);
    println!();
}
