//! Run orchestration
//!
//! [`Pipeline`] walks a run through the [`Stage`]s in order and collects a
//! [`RunSummary`] along the way.

pub mod orchestrator;
pub mod stage;
pub mod summary;

pub use orchestrator::{Pipeline, PipelineSettings};
pub use stage::Stage;
pub use summary::{RunStatus, RunSummary};
