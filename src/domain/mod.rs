//! Domain models and types for the billing aggregator.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed names** ([`SystemName`], [`TableName`])
//! - **Script models** ([`ScriptFile`], [`SystemScriptSet`])
//! - **Error types** ([`AggregatorError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, AggregatorError>`]:
//!
//! ```rust
//! use billing_aggregator::domain::{AggregatorError, Result, SystemName};
//!
//! fn parse(name: &str) -> Result<SystemName> {
//!     SystemName::new(name).map_err(AggregatorError::Validation)
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod result;
pub mod script;

// Re-export commonly used types for convenience
pub use errors::AggregatorError;
pub use ids::{SystemName, TableName};
pub use result::Result;
pub use script::{ScriptFile, SystemScriptSet};
