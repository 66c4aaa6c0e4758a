//! Tripica billing system

use crate::core::processors::traits::{Processor, ProcessorContext};
use crate::domain::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Registry name of the Tripica processor
pub const TRIPICA: &str = "tripica";

/// Runs the Tripica init scripts under `{scripts_root}/tripica/init`
pub struct TripicaProcessor {
    context: ProcessorContext,
}

impl TripicaProcessor {
    /// Create the processor
    pub fn new(context: ProcessorContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Processor for TripicaProcessor {
    fn name(&self) -> &str {
        TRIPICA
    }

    async fn process(&self, cancel: &CancellationToken) -> Result<()> {
        if self.context.is_ignored(TRIPICA) {
            self.context.skip(TRIPICA);
            return Ok(());
        }
        tracing::info!("Starting Tripica processor");

        let init_dir = self.context.system_init_dir(TRIPICA);
        self.context.run_scripts(TRIPICA, &init_dir, cancel).await?;

        tracing::info!("Tripica processing completed");
        Ok(())
    }
}
