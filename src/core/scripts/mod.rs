//! SQL script discovery, splitting and execution
//!
//! Script trees are laid out as `{phase_dir}/{system}/**/*.sql`. See
//! [`discovery`] for the ordering rules, [`splitter`] for how statements are
//! delimited and [`executor`] for the failure policy.

pub mod discovery;
pub mod executor;
pub mod splitter;

pub use discovery::{discover_scripts, discover_system_scripts, SKIP_MARKER};
pub use executor::{ExecutionMode, ExecutionStats, ScriptExecutor};
pub use splitter::{split_statements, SplitMode};
