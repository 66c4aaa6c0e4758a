//! Domain error types
//!
//! This module defines the error hierarchy for the billing aggregator.
//! Errors are domain-specific and don't expose third-party types: driver and
//! SDK errors are rendered into messages at the adapter boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Main aggregator error type
///
/// Every variant that crosses a component boundary carries enough context
/// (stage, system, path or file) to diagnose a failed run from its logs alone.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// Configuration-related errors (pre-flight, always fatal)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The store could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// Database errors outside of script execution
    #[error("Database error: {0}")]
    Database(String),

    /// Script discovery failed for a reason other than a missing phase directory
    #[error("Failed to discover scripts in {}: {message}", dir.display())]
    Discovery { dir: PathBuf, message: String },

    /// A script could not be read or one of its statements failed
    #[error("Script {} failed at statement {statement}: {message}", path.display())]
    Script {
        path: PathBuf,
        /// 1-based index of the failing statement
        statement: usize,
        message: String,
    },

    /// A per-system processor failed
    #[error("Processor {system} failed: {source}")]
    Processor {
        system: String,
        #[source]
        source: Box<AggregatorError>,
    },

    /// Export of a single table failed
    #[error("Export of table {table} failed: {message}")]
    Export { table: String, message: String },

    /// A file could not be uploaded within the retry bound
    #[error("Upload of {} failed after {attempts} attempt(s): {message}", file.display())]
    Upload {
        file: PathBuf,
        attempts: usize,
        message: String,
    },

    /// Object storage errors (single attempt)
    #[error("Object storage error: {0}")]
    ObjectStore(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The run was cancelled at an operation boundary
    #[error("Operation cancelled")]
    Cancelled,

    /// A fatal error annotated with the pipeline stage it stopped
    #[error("Stage {stage} failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<AggregatorError>,
    },
}

impl AggregatorError {
    /// Wraps this error with the name of the pipeline stage it occurred in
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        AggregatorError::Stage {
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, looking through stage and processor wrappers
    pub fn root_cause(&self) -> &AggregatorError {
        match self {
            AggregatorError::Stage { source, .. } | AggregatorError::Processor { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    /// Whether the root cause is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), AggregatorError::Cancelled)
    }

    /// Process exit code for this error
    ///
    /// 2 = configuration, 4 = connectivity, 130 = cancelled, 5 = any other fatal error.
    pub fn exit_code(&self) -> i32 {
        match self.root_cause() {
            AggregatorError::Configuration(_) | AggregatorError::Validation(_) => 2,
            AggregatorError::Connection(_) => 4,
            AggregatorError::Cancelled => 130,
            _ => 5,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for AggregatorError {
    fn from(err: std::io::Error) -> Self {
        AggregatorError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for AggregatorError {
    fn from(err: serde_json::Error) -> Self {
        AggregatorError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for AggregatorError {
    fn from(err: toml::de::Error) -> Self {
        AggregatorError::Configuration(format!("TOML parse error: {err}"))
    }
}

// Conversion from csv writer errors
impl From<csv::Error> for AggregatorError {
    fn from(err: csv::Error) -> Self {
        AggregatorError::Io(format!("CSV write error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_error_display_names_path_and_statement() {
        let err = AggregatorError::Script {
            path: PathBuf::from("scripts/init/tripica/001_setup.sql"),
            statement: 3,
            message: "syntax error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Script scripts/init/tripica/001_setup.sql failed at statement 3: syntax error"
        );
    }

    #[test]
    fn test_processor_error_carries_system() {
        let err = AggregatorError::Processor {
            system: "tripica".to_string(),
            source: Box::new(AggregatorError::Database("boom".to_string())),
        };
        assert!(err.to_string().starts_with("Processor tripica failed"));
    }

    #[test]
    fn test_upload_error_names_file_and_attempts() {
        let err = AggregatorError::Upload {
            file: PathBuf::from("/tmp/exports/tripica_tripica_results_0001.csv"),
            attempts: 3,
            message: "timeout".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("tripica_tripica_results_0001.csv"));
        assert!(text.contains("3 attempt(s)"));
    }

    #[test]
    fn test_root_cause_looks_through_wrappers() {
        let err = AggregatorError::Processor {
            system: "bookkeeper".to_string(),
            source: Box::new(AggregatorError::Cancelled),
        }
        .in_stage("per_system_processing");

        assert!(err.is_cancelled());
        assert!(matches!(err.root_cause(), AggregatorError::Cancelled));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            AggregatorError::Configuration("x".to_string()).exit_code(),
            2
        );
        assert_eq!(AggregatorError::Connection("x".to_string()).exit_code(), 4);
        assert_eq!(
            AggregatorError::Cancelled.in_stage("upload").exit_code(),
            130
        );
        assert_eq!(
            AggregatorError::Database("x".to_string())
                .in_stage("archive")
                .exit_code(),
            5
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: AggregatorError = io_err.into();
        assert!(matches!(err, AggregatorError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: AggregatorError = toml_err.into();
        assert!(matches!(err, AggregatorError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_aggregator_error_implements_std_error() {
        let err = AggregatorError::Validation("Test error".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
