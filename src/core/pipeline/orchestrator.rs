//! Pipeline orchestrator - drives a run through its stages
//!
//! ```text
//! Init → PerSystemProcessing → Export → Upload → Archive → Done
//! ```
//!
//! Stages never repeat and never run out of order. Every stage except
//! `Export` stops the run on its first error; export failures are recorded
//! per table and the remaining tables still run. Cancellation is checked at
//! each stage boundary, and the components check it again at their own
//! boundaries (scripts, tables, upload attempts).

use crate::adapters::database::SqlStore;
use crate::adapters::object_store::ObjectStore;
use crate::config::AggregatorConfig;
use crate::core::export::{ObjectStoreUploader, TableExporter, UploadPolicy};
use crate::core::pipeline::stage::Stage;
use crate::core::pipeline::summary::RunSummary;
use crate::core::processors::{ProcessorContext, ProcessorRegistry};
use crate::core::scripts::{ExecutionMode, ScriptExecutor, SplitMode};
use crate::domain::{AggregatorError, Result, SystemName};
use crate::logging::RunContext;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

/// Resolved pipeline settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Systems in processing and export order
    pub systems: Vec<String>,
    /// Systems whose scripts are never executed
    pub ignore_systems: Vec<String>,
    pub scripts_root: PathBuf,
    pub init_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub execution_mode: ExecutionMode,
    pub split_mode: SplitMode,
    pub output_dir: PathBuf,
    pub max_rows_per_file: usize,
    pub upload_policy: UploadPolicy,
    /// Object key prefix, `{client_id}/{environment}`
    pub remote_prefix: String,
}

impl PipelineSettings {
    /// Resolve settings from configuration
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::Configuration`] for an unknown execution or
    /// split mode.
    pub fn from_config(config: &AggregatorConfig) -> Result<Self> {
        let execution_mode = config
            .scripts
            .execution_mode
            .parse::<ExecutionMode>()
            .map_err(AggregatorError::Configuration)?;
        let split_mode = config
            .scripts
            .split_mode
            .parse::<SplitMode>()
            .map_err(AggregatorError::Configuration)?;

        Ok(Self {
            systems: config.pipeline.systems.clone(),
            ignore_systems: config.pipeline.ignore_systems.clone(),
            scripts_root: config.scripts.root_dir.clone(),
            init_dir: config.scripts.init_dir(),
            archive_dir: config.scripts.archive_dir(),
            execution_mode,
            split_mode,
            output_dir: config.export.output_dir.clone(),
            max_rows_per_file: config.export.max_rows_per_file,
            upload_policy: UploadPolicy {
                max_attempts: config.upload.max_attempts,
                backoff_unit: Duration::from_millis(config.upload.backoff_unit_ms),
            },
            remote_prefix: config.remote_prefix(),
        })
    }
}

/// A configured run of the billing pipeline
pub struct Pipeline {
    settings: PipelineSettings,
    executor: Arc<ScriptExecutor>,
    registry: ProcessorRegistry,
    exporter: TableExporter,
    uploader: ObjectStoreUploader,
    run: RunContext,
    span: Span,
}

impl Pipeline {
    /// Assemble a pipeline with the default processor registry
    pub fn new(
        settings: PipelineSettings,
        store: Arc<dyn SqlStore>,
        object_store: Arc<dyn ObjectStore>,
        run: RunContext,
    ) -> Self {
        let span = run.span();

        let executor = Arc::new(
            ScriptExecutor::new(store.clone(), settings.ignore_systems.clone(), span.clone())
                .with_execution_mode(settings.execution_mode)
                .with_split_mode(settings.split_mode),
        );
        let exporter = TableExporter::new(
            store,
            settings.output_dir.clone(),
            settings.max_rows_per_file,
            span.clone(),
        );
        let uploader = ObjectStoreUploader::new(
            object_store,
            settings.remote_prefix.clone(),
            settings.upload_policy,
            span.clone(),
        );

        Self {
            settings,
            executor,
            registry: ProcessorRegistry::with_defaults(),
            exporter,
            uploader,
            run,
            span,
        }
    }

    /// Assemble a pipeline from configuration
    ///
    /// # Errors
    ///
    /// See [`PipelineSettings::from_config`].
    pub fn from_config(
        config: &AggregatorConfig,
        store: Arc<dyn SqlStore>,
        object_store: Arc<dyn ObjectStore>,
        run: RunContext,
    ) -> Result<Self> {
        let settings = PipelineSettings::from_config(config)?;
        Ok(Self::new(settings, store, object_store, run))
    }

    /// Replace the processor registry
    pub fn with_registry(mut self, registry: ProcessorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Resolved settings
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Identity of this run
    pub fn run_context(&self) -> &RunContext {
        &self.run
    }

    /// Run every stage and return the summary
    ///
    /// # Errors
    ///
    /// Returns the first fatal error wrapped in [`AggregatorError::Stage`].
    /// Use [`Pipeline::execute`] to keep the summary of a failed run.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunSummary> {
        let (summary, result) = self.execute(cancel).await;
        result.map(|()| summary)
    }

    /// Run every stage, returning the summary together with the outcome
    ///
    /// The summary is filled in even when the run fails, so callers can
    /// report how far it got.
    pub async fn execute(&self, cancel: &CancellationToken) -> (RunSummary, Result<()>) {
        let started = Instant::now();
        let mut summary = RunSummary::new(&self.run);

        let result = self
            .run_stages(&mut summary, cancel)
            .instrument(self.span.clone())
            .await;

        summary.finish(started.elapsed(), result.as_ref().err());
        match &result {
            Ok(()) => tracing::info!(parent: &self.span, "Pipeline completed"),
            Err(e) if e.is_cancelled() => {
                tracing::warn!(parent: &self.span, stage = %summary.stage, "Pipeline cancelled")
            }
            Err(e) => {
                tracing::error!(parent: &self.span, stage = %summary.stage, error = %e, "Pipeline failed")
            }
        }
        (summary, result)
    }

    async fn run_stages(
        &self,
        summary: &mut RunSummary,
        cancel: &CancellationToken,
    ) -> Result<()> {
        tracing::info!(
            systems = ?self.settings.systems,
            ignore_systems = ?self.settings.ignore_systems,
            "Starting pipeline"
        );

        let mut files: Vec<PathBuf> = Vec::new();
        let mut stage = Stage::Init;

        loop {
            summary.stage = stage;
            if stage == Stage::Done {
                return Ok(());
            }
            if cancel.is_cancelled() {
                return Err(AggregatorError::Cancelled.in_stage(stage.as_str()));
            }

            tracing::info!(stage = %stage, "Entering stage");
            self.run_stage(stage, summary, &mut files, cancel)
                .await
                .map_err(|e| e.in_stage(stage.as_str()))?;

            stage = stage.next().unwrap_or(Stage::Done);
        }
    }

    async fn run_stage(
        &self,
        stage: Stage,
        summary: &mut RunSummary,
        files: &mut Vec<PathBuf>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match stage {
            Stage::Init => {
                summary.init = self
                    .executor
                    .execute_scripts_in_dir(&self.settings.init_dir, cancel)
                    .await?;
            }
            Stage::PerSystemProcessing => self.process_systems(summary, cancel).await?,
            Stage::Export => *files = self.export_tables(summary, cancel).await?,
            Stage::Upload => {
                if files.is_empty() {
                    tracing::info!("No files to upload");
                } else {
                    summary.uploads = self.uploader.upload_files(files, cancel).await?;
                }
            }
            Stage::Archive => {
                summary.archive = self
                    .executor
                    .execute_scripts_in_dir(&self.settings.archive_dir, cancel)
                    .await?;
            }
            Stage::Done => {}
        }
        Ok(())
    }

    async fn process_systems(
        &self,
        summary: &mut RunSummary,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let context = ProcessorContext::new(self.executor.clone(), &self.settings.scripts_root);

        for system in &self.settings.systems {
            if cancel.is_cancelled() {
                return Err(AggregatorError::Cancelled);
            }

            let Some(processor) = self.registry.resolve(system, &context) else {
                tracing::warn!(system = %system, "No processor registered for system, skipping");
                summary.systems_skipped.push(system.clone());
                continue;
            };

            let span = tracing::info_span!(parent: &self.span, "processor", system = %system);
            processor
                .process(cancel)
                .instrument(span)
                .await
                .map_err(|e| AggregatorError::Processor {
                    system: processor.name().to_string(),
                    source: Box::new(e),
                })?;
            summary.systems_processed.push(system.clone());
        }

        Ok(())
    }

    /// Exports `{system}_results` of every configured system
    ///
    /// Returns the files of the tables that were exported completely. Only
    /// cancellation or an invalid system name is returned as an error.
    async fn export_tables(
        &self,
        summary: &mut RunSummary,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for system in &self.settings.systems {
            if cancel.is_cancelled() {
                return Err(AggregatorError::Cancelled);
            }

            let table = SystemName::new(system.as_str())
                .and_then(|name| name.result_table())
                .map_err(AggregatorError::Validation)?;
            let outcome = self.exporter.export_table(&table, system, cancel).await;
            summary.exports.push(outcome.report());

            match outcome.error {
                None => files.extend(outcome.files),
                Some(e) if e.is_cancelled() => return Err(e),
                Some(e) => {
                    let context = format!("export of table {table} failed");
                    crate::log_error_with_context!(e, context.as_str());
                    if !outcome.files.is_empty() {
                        tracing::warn!(
                            table = %table,
                            files = outcome.files.len(),
                            output_dir = %self.exporter.output_dir().display(),
                            "Partial export files are kept locally and not uploaded"
                        );
                    }
                }
            }
        }

        Ok(files)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("run_id", &self.run.run_id)
            .finish()
    }
}
