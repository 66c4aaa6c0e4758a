//! PostgreSQL client implementation
//!
//! Owns the deadpool connection pool and the settings used to build it.

use crate::config::schema::DatabaseConfig;
use crate::domain::{AggregatorError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::config::SslMode;
use tokio_postgres::NoTls;

/// How often idle connections are checked against the idle limits
const IDLE_REAP_INTERVAL: Duration = Duration::from_secs(30);

/// PostgreSQL client
///
/// Connections are created lazily by the pool. A background task closes idle
/// connections beyond `max_idle` or older than `idle_minutes`.
pub struct PostgreSQLClient {
    pool: Pool,
    config: DatabaseConfig,
    reaper: Option<JoinHandle<()>>,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// Does not connect; use [`PostgreSQLClient::test_connection`] for that.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if TLS cannot be set up or the pool
    /// cannot be built.
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        let pg_config = build_pg_config(&config)?;
        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match config.ssl_mode.as_str() {
            "disable" => Manager::from_config(pg_config, NoTls, manager_config),
            mode => {
                let tls = build_tls_connector(mode)?;
                Manager::from_config(pg_config, tls, manager_config)
            }
        };

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .map_err(|e| {
                AggregatorError::Configuration(format!("Failed to create connection pool: {e}"))
            })?;

        let reaper = spawn_idle_reaper(
            pool.clone(),
            config.max_idle,
            Duration::from_secs(config.idle_minutes * 60),
        );

        tracing::debug!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            user = %config.user,
            ssl_mode = %config.ssl_mode,
            max_conns = config.max_connections,
            max_idle = config.max_idle,
            minutes_idle = config.idle_minutes,
            "PostgreSQL pool created"
        );

        Ok(Self {
            pool,
            config,
            reaper,
        })
    }

    /// Test the connection to PostgreSQL
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::Connection`] if no connection can be obtained
    /// or `SELECT 1` does not answer within the connection timeout.
    pub async fn test_connection(&self) -> Result<()> {
        let timeout = Duration::from_secs(self.config.connection_timeout_seconds);
        let check = async {
            let client = self.get_connection().await?;
            client
                .simple_query("SELECT 1")
                .await
                .map_err(|e| AggregatorError::Connection(format!("Connection test failed: {e}")))?;
            Ok::<_, AggregatorError>(())
        };

        tokio::time::timeout(timeout, check).await.map_err(|_| {
            AggregatorError::Connection(format!(
                "Connection test timed out after {}s",
                timeout.as_secs()
            ))
        })?
    }

    /// Get a connection from the pool
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::Connection`] if a connection cannot be obtained.
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            AggregatorError::Connection(format!("Failed to get connection from pool: {e}"))
        })
    }

    /// Connection target without credentials, for logs
    pub fn connection_string_safe(&self) -> String {
        format!(
            "postgresql://{}:***@{}:{}/{}",
            self.config.user, self.config.host, self.config.port, self.config.name
        )
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

impl Drop for PostgreSQLClient {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.take() {
            reaper.abort();
        }
        self.pool.close();
    }
}

fn build_pg_config(config: &DatabaseConfig) -> Result<tokio_postgres::Config> {
    let mut pg_config = tokio_postgres::Config::new();
    pg_config
        .host(&config.host)
        .port(config.port)
        .dbname(&config.name)
        .user(&config.user)
        .application_name(crate::logging::SERVICE_NAME)
        .connect_timeout(Duration::from_secs(config.connection_timeout_seconds));

    if let Some(password) = &config.password {
        let password: &str = password.expose_secret().as_ref();
        pg_config.password(password);
    }

    let ssl_mode = match config.ssl_mode.as_str() {
        "disable" => SslMode::Disable,
        "prefer" => SslMode::Prefer,
        "require" | "verify-full" => SslMode::Require,
        other => {
            return Err(AggregatorError::Configuration(format!(
                "Unsupported ssl_mode '{other}'"
            )))
        }
    };
    pg_config.ssl_mode(ssl_mode);

    Ok(pg_config)
}

fn build_tls_connector(ssl_mode: &str) -> Result<postgres_native_tls::MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    // prefer and require encrypt without checking the server certificate, as libpq does
    if ssl_mode != "verify-full" {
        builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }
    let connector = builder.build().map_err(|e| {
        AggregatorError::Configuration(format!("Failed to build TLS connector: {e}"))
    })?;
    Ok(postgres_native_tls::MakeTlsConnector::new(connector))
}

/// Closes idle connections beyond `max_idle` or idle for longer than `max_idle_time`
fn spawn_idle_reaper(pool: Pool, max_idle: usize, max_idle_time: Duration) -> Option<JoinHandle<()>> {
    let handle = tokio::runtime::Handle::try_current().ok()?;
    Some(handle.spawn(async move {
        let mut interval = tokio::time::interval(IDLE_REAP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let kept = std::cell::Cell::new(0usize);
            let result = pool.retain(|_, metrics| {
                let keep = kept.get() < max_idle && metrics.last_used() < max_idle_time;
                if keep {
                    kept.set(kept.get() + 1);
                }
                keep
            });
            if !result.removed.is_empty() {
                tracing::debug!(
                    closed = result.removed.len(),
                    retained = result.retained,
                    "Closed idle database connections"
                );
            }
        }
    }))
}
