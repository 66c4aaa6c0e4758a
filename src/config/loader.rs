//! Configuration loader with TOML parsing and environment variable overrides
//!
//! Loading order:
//! 1. Read the TOML file (when one is given)
//! 2. Substitute `${VAR}` placeholders
//! 3. Parse into [`AggregatorConfig`]
//! 4. Apply `BDA_*` environment overrides
//! 5. Validate

use super::schema::AggregatorConfig;
use super::secret::secret_string;
use crate::domain::errors::AggregatorError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Loads configuration from an optional TOML file and the process environment
///
/// Without a file the configuration is built from defaults and `BDA_*`
/// variables alone, which is how the aggregator runs inside AWS Batch.
///
/// # Errors
///
/// Returns [`AggregatorError::Configuration`] if:
/// - The file cannot be read
/// - A referenced `${VAR}` is not set
/// - TOML parsing fails
/// - An override cannot be parsed
/// - Validation fails
///
/// # Examples
///
/// ```no_run
/// use billing_aggregator::config::loader::load_config;
///
/// let config = load_config(Some("billing-aggregator.toml")).expect("Failed to load config");
/// ```
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<AggregatorConfig> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] but resolves variables through `lookup`
pub fn load_config_with<P, F>(path: Option<P>, lookup: F) -> Result<AggregatorConfig>
where
    P: AsRef<Path>,
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => parse_file(path.as_ref(), &lookup)?,
        None => AggregatorConfig::default(),
    };

    apply_env_overrides(&mut config, &lookup)?;

    config.validate().map_err(|e| {
        AggregatorError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

fn parse_file<F>(path: &Path, lookup: &F) -> Result<AggregatorConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if !path.exists() {
        return Err(AggregatorError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        AggregatorError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents, lookup)?;

    toml::from_str(&contents)
        .map_err(|e| AggregatorError::Configuration(format!("Failed to parse TOML: {e}")))
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars<F>(input: &str, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = placeholder_regex();
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match lookup(var_name) {
                Some(value) => value,
                None => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(AggregatorError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AggregatorError::Configuration(format!("Invalid value for {key}: {e}"))),
        _ => Ok(None),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Applies environment variable overrides using the `BDA_*` prefix
fn apply_env_overrides<F>(config: &mut AggregatorConfig, lookup: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let set = |key: &str| lookup(key).filter(|v| !v.is_empty());

    // Identity
    if let Some(val) = set("BDA_CLIENT_ID") {
        config.client_id = val;
    }
    if let Some(val) = set("BDA_ENVIRONMENT") {
        config.environment = val;
    }

    // Application
    if let Some(val) = set("BDA_LOG_LEVEL") {
        config.application.log_level = val.to_lowercase();
    }
    if let Some(val) = set("BDA_LOG_FORMAT") {
        config.application.log_format = val.to_lowercase();
    }

    // Database
    if let Some(val) = set("BDA_DB_HOST") {
        config.database.host = val;
    }
    if let Some(port) = parse_var(lookup, "BDA_DB_PORT")? {
        config.database.port = port;
    }
    if let Some(val) = set("BDA_DB_NAME") {
        config.database.name = val;
    }
    if let Some(val) = set("BDA_DB_USER") {
        config.database.user = val;
    }
    if let Some(val) = set("BDA_DB_PASSWORD") {
        config.database.password = Some(secret_string(val));
    }
    if let Some(val) = set("BDA_DB_SSL_MODE") {
        config.database.ssl_mode = val;
    }
    if let Some(conns) = parse_var(lookup, "BDA_DB_MAX_CONNS")? {
        config.database.max_connections = conns;
    }
    if let Some(idle) = parse_var(lookup, "BDA_DB_MAX_IDLE")? {
        config.database.max_idle = idle;
    }
    if let Some(minutes) = parse_var(lookup, "BDA_DB_MINUTES_IDLE")? {
        config.database.idle_minutes = minutes;
    }

    // S3
    if let Some(val) = set("BDA_S3_REGION") {
        config.s3.region = val;
    }
    if let Some(val) = set("BDA_S3_BUCKET") {
        config.s3.bucket = val;
    }
    if let Some(val) = set("BDA_S3_URL") {
        config.s3.endpoint = Some(val);
    }
    if let Some(val) = set("BDA_S3_ACCESS_KEY") {
        config.s3.access_key_id = Some(val);
    }
    if let Some(val) = set("BDA_S3_SECRET_ACCESS_KEY") {
        config.s3.secret_access_key = Some(secret_string(val));
    }

    // Pipeline
    if let Some(val) = set("BDA_SYSTEMS") {
        config.pipeline.systems = parse_list(&val);
    }
    if let Some(val) = set("BDA_IGNORE_SYSTEMS") {
        config.pipeline.ignore_systems = parse_list(&val);
    }

    // Scripts and export
    if let Some(val) = set("BDA_SCRIPTS_DIR") {
        config.scripts.root_dir = PathBuf::from(val);
    }
    if let Some(val) = set("BDA_SCRIPTS_EXECUTION_MODE") {
        config.scripts.execution_mode = val;
    }
    if let Some(val) = set("BDA_OUTPUT_DIR") {
        config.export.output_dir = PathBuf::from(val);
    }
    if let Some(rows) = parse_var(lookup, "BDA_MAX_ROW_SIZE_FILE")? {
        config.export.max_rows_per_file = rows;
    }

    // Upload
    if let Some(attempts) = parse_var(lookup, "BDA_UPLOAD_MAX_ATTEMPTS")? {
        config.upload.max_attempts = attempts;
    }
    if let Some(unit) = parse_var(lookup, "BDA_UPLOAD_BACKOFF_MS")? {
        config.upload.backoff_unit_ms = unit;
    }

    // Logging
    if let Some(val) = set("BDA_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Some(val) = set("BDA_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
