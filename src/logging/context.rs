//! Run context carried by every log line
//!
//! The pipeline components do not reach for a global logger. Each one is
//! handed the root [`tracing::Span`] built here and enters it (or a child of
//! it) around its work, so `client_id`, `environment`, `run_id` and
//! `batch_job_id` appear on every event of a run.

use crate::config::AggregatorConfig;
use tracing::Span;
use uuid::Uuid;

/// Service name reported in the root span
pub const SERVICE_NAME: &str = "billing-aggregator";

/// Identity of a single pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Client identifier
    pub client_id: String,
    /// Deployment environment label
    pub environment: String,
    /// AWS Batch job id, when running inside AWS Batch
    pub batch_job_id: Option<String>,
}

impl RunContext {
    /// Creates a context with a fresh run id
    pub fn new(client_id: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            client_id: client_id.into(),
            environment: environment.into(),
            batch_job_id: None,
        }
    }

    /// Creates the context for a configured run, picking up `AWS_BATCH_JOB_ID`
    pub fn from_config(config: &AggregatorConfig) -> Self {
        let mut context = Self::new(&config.client_id, &config.environment);
        context.batch_job_id = std::env::var("AWS_BATCH_JOB_ID")
            .ok()
            .filter(|id| !id.is_empty());
        context
    }

    /// Builds the root span of the run
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "pipeline",
            service = SERVICE_NAME,
            client_id = %self.client_id,
            environment = %self.environment,
            run_id = %self.run_id,
            batch_job_id = self.batch_job_id.as_deref().unwrap_or(""),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunContext::new("swb", "prod");
        let b = RunContext::new("swb", "prod");
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.client_id, "swb");
        assert!(a.batch_job_id.is_none());
    }
}
