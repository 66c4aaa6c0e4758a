//! Configuration schema types
//!
//! This module defines the configuration structure for the billing aggregator.
//! Every section has defaults, so an empty TOML document plus the required
//! `BDA_*` environment variables is a complete configuration.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment label used when nothing else is known
pub const LOCAL_ENVIRONMENT: &str = "local";

/// Main aggregator configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Client identifier; first segment of every remote object key
    #[serde(default)]
    pub client_id: String,

    /// Deployment environment label; second segment of every remote object key
    #[serde(default = "detect_environment")]
    pub environment: String,

    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// PostgreSQL connection settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// S3 object storage settings
    #[serde(default)]
    pub s3: S3Config,

    /// Which systems to process
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Script directories and execution behavior
    #[serde(default)]
    pub scripts: ScriptsConfig,

    /// CSV export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Upload retry settings
    #[serde(default)]
    pub upload: UploadConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            environment: detect_environment(),
            application: ApplicationConfig::default(),
            database: DatabaseConfig::default(),
            s3: S3Config::default(),
            pipeline: PipelineConfig::default(),
            scripts: ScriptsConfig::default(),
            export: ExportConfig::default(),
            upload: UploadConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AggregatorConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.trim().is_empty() {
            return Err("client_id is required (BDA_CLIENT_ID)".to_string());
        }
        if self.client_id.contains('/') {
            return Err("client_id must not contain '/'".to_string());
        }
        if self.environment.trim().is_empty() {
            return Err("environment cannot be empty".to_string());
        }
        if self.environment.contains('/') {
            return Err("environment must not contain '/'".to_string());
        }

        self.application.validate()?;
        self.database.validate()?;
        self.s3.validate()?;
        self.pipeline.validate()?;
        self.scripts.validate()?;
        self.export.validate()?;
        self.upload.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Whether the configuration describes a local developer run
    pub fn is_local(&self) -> bool {
        self.environment == LOCAL_ENVIRONMENT
    }

    /// Remote key prefix: `{client_id}/{environment}`
    pub fn remote_prefix(&self) -> String {
        format!("{}/{}", self.client_id, self.environment)
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Console log format (json or pretty)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.log_format,
                valid_formats.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// PostgreSQL database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host
    #[serde(default)]
    pub host: String,

    /// Database port
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Database name
    #[serde(default = "default_db_name")]
    pub name: String,

    /// Database user
    #[serde(default = "default_db_user")]
    pub user: String,

    /// Database password
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub password: Option<SecretString>,

    /// SSL mode (disable, prefer, require, verify-full)
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,

    /// Maximum number of open connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Maximum number of idle connections the pool keeps open
    #[serde(default)]
    pub max_idle: usize,

    /// Minutes a connection may stay idle before it is recycled
    #[serde(default = "default_idle_minutes")]
    pub idle_minutes: u64,

    /// Connection/ping timeout in seconds
    #[serde(default = "default_connection_timeout_seconds")]
    pub connection_timeout_seconds: u64,

    /// Waits (seconds) before each connectivity attempt; its length is the attempt bound
    #[serde(default = "default_connect_retry_schedule_secs")]
    pub connect_retry_schedule_secs: Vec<u64>,
}

impl DatabaseConfig {
    fn validate(&self) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.host.trim().is_empty() {
            return Err("database.host is required (BDA_DB_HOST)".to_string());
        }

        match &self.password {
            Some(password) if !password.expose_secret().is_empty() => {}
            _ => return Err("database.password is required (BDA_DB_PASSWORD)".to_string()),
        }

        if self.name.is_empty() {
            return Err("database.name cannot be empty".to_string());
        }

        if self.max_connections == 0 || self.max_connections > 100 {
            return Err(format!(
                "database.max_connections must be between 1 and 100, got {}",
                self.max_connections
            ));
        }

        if self.max_idle > self.max_connections {
            return Err(format!(
                "database.max_idle ({}) cannot exceed database.max_connections ({})",
                self.max_idle, self.max_connections
            ));
        }

        let valid_ssl_modes = ["disable", "prefer", "require", "verify-full"];
        if !valid_ssl_modes.contains(&self.ssl_mode.as_str()) {
            return Err(format!(
                "database.ssl_mode must be one of: {}, got '{}'",
                valid_ssl_modes.join(", "),
                self.ssl_mode
            ));
        }

        if self.connect_retry_schedule_secs.is_empty() {
            return Err("database.connect_retry_schedule_secs cannot be empty".to_string());
        }

        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_db_port(),
            name: default_db_name(),
            user: default_db_user(),
            password: None,
            ssl_mode: default_ssl_mode(),
            max_connections: default_max_connections(),
            max_idle: 0,
            idle_minutes: default_idle_minutes(),
            connection_timeout_seconds: default_connection_timeout_seconds(),
            connect_retry_schedule_secs: default_connect_retry_schedule_secs(),
        }
    }
}

/// S3 object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// AWS region
    #[serde(default = "default_s3_region")]
    pub region: String,

    /// Target bucket
    #[serde(default)]
    pub bucket: String,

    /// Custom endpoint (e.g. LocalStack or MinIO); path-style addressing is used when set
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Static access key id; the default AWS credential chain is used when absent
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Static secret access key
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub secret_access_key: Option<SecretString>,
}

impl S3Config {
    fn validate(&self) -> Result<(), String> {
        if self.bucket.trim().is_empty() {
            return Err("s3.bucket is required (BDA_S3_BUCKET)".to_string());
        }

        if self.region.trim().is_empty() {
            return Err("s3.region cannot be empty".to_string());
        }

        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("s3.endpoint must start with http:// or https://".to_string());
            }
        }

        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(
                "s3.access_key_id and s3.secret_access_key must be set together".to_string(),
            );
        }

        Ok(())
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: default_s3_region(),
            bucket: String::new(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

/// Which billing systems the pipeline processes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Systems to process, in order
    #[serde(default = "default_systems")]
    pub systems: Vec<String>,

    /// Systems whose scripts are never executed
    #[serde(default)]
    pub ignore_systems: Vec<String>,
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), String> {
        for system in &self.systems {
            crate::domain::SystemName::new(system.as_str())
                .and_then(|name| name.result_table())
                .map_err(|e| format!("pipeline: {e}"))?;
        }
        for system in &self.ignore_systems {
            crate::domain::SystemName::new(system.as_str())
                .map_err(|e| format!("pipeline: {e}"))?;
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            systems: default_systems(),
            ignore_systems: Vec::new(),
        }
    }
}

/// Script directories and execution behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Root scripts directory
    #[serde(default = "default_scripts_root")]
    pub root_dir: PathBuf,

    /// Init phase directory (defaults to `{root_dir}/init`)
    #[serde(default)]
    pub init_dir: Option<PathBuf>,

    /// Archive phase directory (defaults to `{root_dir}/archive`)
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,

    /// How a script is sent to the store (separate or whole)
    #[serde(default = "default_execution_mode")]
    pub execution_mode: String,

    /// How a script is split into statements (tokenized or naive)
    #[serde(default = "default_split_mode")]
    pub split_mode: String,
}

impl ScriptsConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_modes = ["separate", "whole"];
        if !valid_modes.contains(&self.execution_mode.as_str()) {
            return Err(format!(
                "Invalid scripts.execution_mode '{}'. Must be one of: {}",
                self.execution_mode,
                valid_modes.join(", ")
            ));
        }

        let valid_split = ["tokenized", "naive"];
        if !valid_split.contains(&self.split_mode.as_str()) {
            return Err(format!(
                "Invalid scripts.split_mode '{}'. Must be one of: {}",
                self.split_mode,
                valid_split.join(", ")
            ));
        }
        Ok(())
    }

    /// Effective init phase directory
    pub fn init_dir(&self) -> PathBuf {
        self.init_dir
            .clone()
            .unwrap_or_else(|| self.root_dir.join("init"))
    }

    /// Effective archive phase directory
    pub fn archive_dir(&self) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| self.root_dir.join("archive"))
    }
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            root_dir: default_scripts_root(),
            init_dir: None,
            archive_dir: None,
            execution_mode: default_execution_mode(),
            split_mode: default_split_mode(),
        }
    }
}

/// CSV export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory the CSV chunks are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum number of data rows per CSV file
    #[serde(default = "default_max_rows_per_file")]
    pub max_rows_per_file: usize,
}

impl ExportConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_rows_per_file == 0 {
            return Err("export.max_rows_per_file must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_rows_per_file: default_max_rows_per_file(),
        }
    }
}

/// Upload retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Attempts per file before the upload is declared failed
    #[serde(default = "default_upload_max_attempts")]
    pub max_attempts: usize,

    /// Backoff unit in milliseconds; the wait before retry `n` (1-based) is `n × unit`
    #[serde(default = "default_upload_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
}

impl UploadConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 || self.max_attempts > 10 {
            return Err(format!(
                "upload.max_attempts must be between 1 and 10, got {}",
                self.max_attempts
            ));
        }
        Ok(())
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_upload_max_attempts(),
            backoff_unit_ms: default_upload_backoff_unit_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log file directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily or hourly)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

/// Detects the deployment environment
///
/// `ED4ENV` wins; otherwise a run inside AWS Batch is `prod`; otherwise `local`.
pub fn detect_environment() -> String {
    if let Ok(env) = std::env::var("ED4ENV") {
        if !env.is_empty() {
            return env;
        }
    }
    if std::env::var("AWS_BATCH_JOB_ID").is_ok_and(|id| !id.is_empty()) {
        return "prod".to_string();
    }
    LOCAL_ENVIRONMENT.to_string()
}

fn is_local_run() -> bool {
    detect_environment() == LOCAL_ENVIRONMENT
}

// Default value functions
fn default_log_level() -> String {
    if is_local_run() {
        "debug".to_string()
    } else {
        "info".to_string()
    }
}

fn default_log_format() -> String {
    if is_local_run() {
        "pretty".to_string()
    } else {
        "json".to_string()
    }
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "octopus".to_string()
}

fn default_db_user() -> String {
    "billing_aggregator".to_string()
}

fn default_ssl_mode() -> String {
    if is_local_run() {
        "disable".to_string()
    } else {
        "require".to_string()
    }
}

fn default_max_connections() -> usize {
    4
}

fn default_idle_minutes() -> u64 {
    5
}

fn default_connection_timeout_seconds() -> u64 {
    10
}

fn default_connect_retry_schedule_secs() -> Vec<u64> {
    vec![0, 5, 10, 20, 60]
}

fn default_s3_region() -> String {
    "eu-central-1".to_string()
}

fn default_systems() -> Vec<String> {
    vec!["tripica".to_string(), "bookkeeper".to_string()]
}

fn default_scripts_root() -> PathBuf {
    PathBuf::from("/app/scripts")
}

fn default_execution_mode() -> String {
    "separate".to_string()
}

fn default_split_mode() -> String {
    "tokenized".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("/tmp/exports")
}

fn default_max_rows_per_file() -> usize {
    1_000_000
}

fn default_upload_max_attempts() -> usize {
    3
}

fn default_upload_backoff_unit_ms() -> u64 {
    5000
}

fn default_local_path() -> String {
    "/var/log/billing-aggregator".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    fn valid_config() -> AggregatorConfig {
        let mut config = AggregatorConfig {
            client_id: "swb".to_string(),
            environment: "prod".to_string(),
            ..AggregatorConfig::default()
        };
        config.database.host = "db.internal".to_string();
        config.database.password = Some(secret_string("pw".to_string()));
        config.s3.bucket = "billing-exports".to_string();
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_required_fields() {
        let mut config = valid_config();
        config.client_id = String::new();
        assert!(config.validate().unwrap_err().contains("client_id"));

        let mut config = valid_config();
        config.database.host = String::new();
        assert!(config.validate().unwrap_err().contains("database.host"));

        let mut config = valid_config();
        config.database.password = None;
        assert!(config.validate().unwrap_err().contains("database.password"));

        let mut config = valid_config();
        config.s3.bucket = String::new();
        assert!(config.validate().unwrap_err().contains("s3.bucket"));
    }

    #[test]
    fn test_phase_dirs_derive_from_root() {
        let scripts = ScriptsConfig {
            root_dir: PathBuf::from("/srv/scripts"),
            ..ScriptsConfig::default()
        };
        assert_eq!(scripts.init_dir(), PathBuf::from("/srv/scripts/init"));
        assert_eq!(scripts.archive_dir(), PathBuf::from("/srv/scripts/archive"));

        let overridden = ScriptsConfig {
            archive_dir: Some(PathBuf::from("/elsewhere")),
            ..scripts
        };
        assert_eq!(overridden.archive_dir(), PathBuf::from("/elsewhere"));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = valid_config();
        config.export.max_rows_per_file = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.upload.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.scripts.execution_mode = "parallel".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.pipeline.systems = vec!["../evil".to_string()];
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.s3.access_key_id = Some("AKIA".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_remote_prefix() {
        assert_eq!(valid_config().remote_prefix(), "swb/prod");
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_db_port(), 5432);
        assert_eq!(default_db_name(), "octopus");
        assert_eq!(default_max_connections(), 4);
        assert_eq!(default_connect_retry_schedule_secs(), vec![0, 5, 10, 20, 60]);
        assert_eq!(default_systems(), vec!["tripica", "bookkeeper"]);
        assert_eq!(default_max_rows_per_file(), 1_000_000);
        assert_eq!(default_upload_max_attempts(), 3);
    }
}
