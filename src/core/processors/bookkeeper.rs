//! Bookkeeper billing system

use crate::core::processors::traits::{Processor, ProcessorContext};
use crate::domain::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Registry name of the Bookkeeper processor
pub const BOOKKEEPER: &str = "bookkeeper";

/// Runs the Bookkeeper init scripts under `{scripts_root}/bookkeeper/init`
pub struct BookkeeperProcessor {
    context: ProcessorContext,
}

impl BookkeeperProcessor {
    /// Create the processor
    pub fn new(context: ProcessorContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Processor for BookkeeperProcessor {
    fn name(&self) -> &str {
        BOOKKEEPER
    }

    async fn process(&self, cancel: &CancellationToken) -> Result<()> {
        if self.context.is_ignored(BOOKKEEPER) {
            self.context.skip(BOOKKEEPER);
            return Ok(());
        }
        tracing::info!("Starting Bookkeeper processor");

        let init_dir = self.context.system_init_dir(BOOKKEEPER);
        self.context.run_scripts(BOOKKEEPER, &init_dir, cancel).await?;

        tracing::info!("Bookkeeper processing completed");
        Ok(())
    }
}
