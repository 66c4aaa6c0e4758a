//! Structured logging setup using tracing
//!
//! Console output is JSON outside local runs so that CloudWatch can index the
//! fields, and human-readable when running on a developer machine. A rolling
//! JSON log file can be enabled in addition.
//!
//! # Example
//!
//! ```no_run
//! use billing_aggregator::config::{ApplicationConfig, LoggingConfig};
//! use billing_aggregator::logging::init_logging;
//!
//! let _guard = init_logging(&ApplicationConfig::default(), &LoggingConfig::default())
//!     .expect("Failed to initialize logging");
//! ```

use crate::config::{ApplicationConfig, LoggingConfig};
use crate::domain::{AggregatorError, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Guard that must be kept alive for the duration of the program
/// to ensure logs are flushed properly
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

impl LoggingGuard {
    fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            _file_guard: file_guard,
        }
    }
}

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over the configured level when set.
///
/// # Errors
///
/// Returns a configuration error for an unknown level or format, or when the
/// log directory cannot be created.
pub fn init_logging(app: &ApplicationConfig, config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_level = parse_log_level(&app.log_level)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("billing_aggregator={log_level}")));

    let mut layers = Vec::new();

    let console_layer = match app.log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_filter(env_filter.clone())
            .boxed(),
        "pretty" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(env_filter.clone())
            .boxed(),
        other => {
            return Err(AggregatorError::Configuration(format!(
                "Invalid log format: {other}. Must be one of: json, pretty"
            )))
        }
    };
    layers.push(console_layer);

    let file_guard = if config.local_enabled {
        let rotation = match config.local_rotation.as_str() {
            "hourly" => Rotation::HOURLY,
            _ => Rotation::DAILY,
        };

        std::fs::create_dir_all(&config.local_path).map_err(|e| {
            AggregatorError::Configuration(format!(
                "Failed to create log directory {}: {}",
                config.local_path, e
            ))
        })?;

        let file_appender =
            RollingFileAppender::new(rotation, &config.local_path, "billing-aggregator.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(non_blocking)
            .with_filter(env_filter);

        layers.push(file_layer.boxed());
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry().with(layers).init();

    tracing::debug!(
        log_level = %log_level,
        log_format = %app.log_format,
        local_enabled = config.local_enabled,
        local_path = %config.local_path,
        "Logging initialized"
    );

    Ok(LoggingGuard::new(file_guard))
}

/// Parse log level from string
pub fn parse_log_level(level_str: &str) -> Result<Level> {
    match level_str.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(AggregatorError::Configuration(format!(
            "Invalid log level: {level_str}. Must be one of: trace, debug, info, warn, error"
        ))),
    }
}
