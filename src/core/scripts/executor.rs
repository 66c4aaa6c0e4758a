//! Script execution
//!
//! Runs discovered scripts against the [`SqlStore`], system by system and
//! file by file. Execution is fail-fast: the first failing statement aborts
//! the whole call, since later scripts usually depend on earlier ones.

use crate::adapters::database::SqlStore;
use crate::core::scripts::discovery::{discover_scripts, discover_system_scripts};
use crate::core::scripts::splitter::{split_statements, SplitMode};
use crate::domain::{AggregatorError, Result, ScriptFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

/// How a script is sent to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Split into statements, one store call each
    #[default]
    Separate,
    /// The whole file in a single call
    Whole,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "separate" => Ok(ExecutionMode::Separate),
            "whole" => Ok(ExecutionMode::Whole),
            other => Err(format!("Unknown execution mode '{other}'")),
        }
    }
}

/// Counters for one executor call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Systems whose scripts ran
    pub systems: usize,
    /// Systems skipped because they are ignored
    pub ignored_systems: usize,
    /// Script files executed
    pub scripts: usize,
    /// Store calls made
    pub statements: usize,
}

impl ExecutionStats {
    fn absorb(&mut self, other: ExecutionStats) {
        self.systems += other.systems;
        self.ignored_systems += other.ignored_systems;
        self.scripts += other.scripts;
        self.statements += other.statements;
    }
}

/// Executes SQL scripts against the store
pub struct ScriptExecutor {
    store: Arc<dyn SqlStore>,
    ignored_systems: BTreeSet<String>,
    execution_mode: ExecutionMode,
    split_mode: SplitMode,
    span: Span,
}

impl ScriptExecutor {
    /// Create an executor that skips every system in `ignored_systems`
    pub fn new<I, S>(store: Arc<dyn SqlStore>, ignored_systems: I, span: Span) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store,
            ignored_systems: ignored_systems.into_iter().map(Into::into).collect(),
            execution_mode: ExecutionMode::default(),
            split_mode: SplitMode::default(),
            span,
        }
    }

    /// Set how scripts are sent to the store
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// Set how scripts are split into statements
    pub fn with_split_mode(mut self, mode: SplitMode) -> Self {
        self.split_mode = mode;
        self
    }

    /// Whether scripts of `system` are skipped (exact name match)
    pub fn is_ignored(&self, system: &str) -> bool {
        self.ignored_systems.contains(system)
    }

    /// Execute every system's scripts under a phase directory
    ///
    /// Systems run in name order. A missing `phase_dir` is an empty work set.
    ///
    /// # Errors
    ///
    /// Returns the discovery error, the first script error, or
    /// [`AggregatorError::Cancelled`] when `cancel` fires between scripts.
    pub async fn execute_scripts_in_dir(
        &self,
        phase_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExecutionStats> {
        let span = tracing::info_span!(parent: &self.span, "scripts", directory = %phase_dir.display());
        async {
            tracing::info!("Executing scripts in directory");

            let set = discover_scripts(phase_dir)?;
            let mut stats = ExecutionStats::default();
            for (system, scripts) in set.iter() {
                stats.absorb(self.run_system(system, scripts, cancel).await?);
            }
            Ok(stats)
        }
        .instrument(span)
        .await
    }

    /// Execute the scripts of one system directory
    ///
    /// The ignore set applies here as well.
    ///
    /// # Errors
    ///
    /// Same as [`ScriptExecutor::execute_scripts_in_dir`].
    pub async fn execute_system_scripts(
        &self,
        system: &str,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExecutionStats> {
        let span = tracing::info_span!(parent: &self.span, "scripts", directory = %dir.display());
        async {
            if self.is_ignored(system) {
                return Ok(self.skip_ignored(system));
            }

            tracing::info!(system, "Executing system scripts");
            let scripts = discover_system_scripts(system, dir)?;
            self.run_system(system, &scripts, cancel).await
        }
        .instrument(span)
        .await
    }

    async fn run_system(
        &self,
        system: &str,
        scripts: &[ScriptFile],
        cancel: &CancellationToken,
    ) -> Result<ExecutionStats> {
        if self.is_ignored(system) {
            return Ok(self.skip_ignored(system));
        }

        let mut stats = ExecutionStats::default();

        tracing::info!(system, scripts = scripts.len(), "Processing system");
        stats.systems = 1;

        for script in scripts {
            if cancel.is_cancelled() {
                return Err(AggregatorError::Cancelled);
            }
            stats.statements += self.execute_script(script).await?;
            stats.scripts += 1;
        }

        Ok(stats)
    }

    /// Emits the single notice for an ignored system
    pub fn skip_ignored(&self, system: &str) -> ExecutionStats {
        tracing::info!(system, "Skipping ignored system");
        ExecutionStats {
            ignored_systems: 1,
            ..ExecutionStats::default()
        }
    }

    /// Runs one script file; returns the number of store calls made
    async fn execute_script(&self, script: &ScriptFile) -> Result<usize> {
        tracing::info!(script = %script, "Executing script");

        let content = tokio::fs::read_to_string(script.path())
            .await
            .map_err(|e| {
                AggregatorError::Io(format!("Failed to read script {script}: {e}"))
            })?;

        match self.execution_mode {
            ExecutionMode::Whole => {
                if content.trim().is_empty() {
                    return Ok(0);
                }
                self.store
                    .execute(&content)
                    .await
                    .map_err(|e| script_error(script, 1, e))?;
                Ok(1)
            }
            ExecutionMode::Separate => {
                let statements = split_statements(&content, self.split_mode);
                tracing::debug!(
                    script = %script,
                    statements = statements.len(),
                    "Executing statements separately"
                );

                for (index, statement) in statements.iter().enumerate() {
                    self.store
                        .execute(statement)
                        .await
                        .map_err(|e| script_error(script, index + 1, e))?;
                }
                Ok(statements.len())
            }
        }
    }
}

fn script_error(script: &ScriptFile, statement: usize, source: AggregatorError) -> AggregatorError {
    let message = match source {
        AggregatorError::Database(message) => message,
        other => other.to_string(),
    };
    AggregatorError::Script {
        path: script.path().to_path_buf(),
        statement,
        message,
    }
}
