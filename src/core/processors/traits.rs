//! Processor capability

use crate::core::scripts::ScriptExecutor;
use crate::domain::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-billing-system processing step
///
/// Runs between the init phase and the export stage.
#[async_trait]
pub trait Processor: Send + Sync {
    /// System name this processor handles
    fn name(&self) -> &str;

    /// Run the system's processing
    ///
    /// # Errors
    ///
    /// Any error is fatal for the run.
    async fn process(&self, cancel: &CancellationToken) -> Result<()>;
}

/// What a processor needs from the surrounding pipeline
#[derive(Clone)]
pub struct ProcessorContext {
    /// Shared script executor
    pub executor: Arc<ScriptExecutor>,
    /// Root scripts directory
    pub scripts_root: PathBuf,
}

impl ProcessorContext {
    /// Create a context
    pub fn new(executor: Arc<ScriptExecutor>, scripts_root: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            scripts_root: scripts_root.into(),
        }
    }

    /// `{scripts_root}/{system}/init`
    pub fn system_init_dir(&self, system: &str) -> PathBuf {
        self.scripts_root.join(system).join("init")
    }

    /// Whether `system` is in the executor's ignore set
    pub fn is_ignored(&self, system: &str) -> bool {
        self.executor.is_ignored(system)
    }

    /// Logs the ignore notice for `system` and nothing else
    pub(crate) fn skip(&self, system: &str) {
        self.executor.skip_ignored(system);
    }

    /// Runs the scripts of `dir` as `system`
    pub(crate) async fn run_scripts(
        &self,
        system: &str,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let stats = self
            .executor
            .execute_system_scripts(system, dir, cancel)
            .await?;
        tracing::debug!(
            system,
            scripts = stats.scripts,
            statements = stats.statements,
            "System scripts executed"
        );
        Ok(())
    }
}
