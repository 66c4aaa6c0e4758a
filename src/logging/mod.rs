//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - JSON console output for deployed runs, readable output locally
//! - Configurable log levels (`RUST_LOG` wins when set)
//! - Local file logging with rotation
//! - A per-run root span ([`RunContext`])
//!
//! # Example
//!
//! ```no_run
//! use billing_aggregator::config::{ApplicationConfig, LoggingConfig};
//! use billing_aggregator::logging::{init_logging, RunContext};
//!
//! let _guard = init_logging(&ApplicationConfig::default(), &LoggingConfig::default())
//!     .expect("Failed to initialize logging");
//!
//! let span = RunContext::new("swb", "prod").span();
//! let _entered = span.enter();
//! tracing::info!("Application started");
//! ```

pub mod context;
pub mod structured;

// Re-export commonly used items
pub use context::{RunContext, SERVICE_NAME};
pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log the completion of a table export
///
/// # Example
///
/// ```no_run
/// use billing_aggregator::log_export_complete;
/// use std::time::Duration;
///
/// log_export_complete!("tripica_results", 3, 2_500_000, Duration::from_secs(10));
/// ```
#[macro_export]
macro_rules! log_export_complete {
    ($table:expr, $files:expr, $rows:expr, $duration:expr) => {
        tracing::info!(
            table = %$table,
            files = $files,
            rows = $rows,
            duration_ms = $duration.as_millis() as u64,
            "Table export completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use billing_aggregator::log_error_with_context;
/// use billing_aggregator::domain::AggregatorError;
///
/// let error = AggregatorError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use billing_aggregator::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        );
    };
}
