//! Startup connectivity check
//!
//! The database may still be starting when a batch job launches, so the
//! first ping is retried on an increasing wait schedule before giving up.

use crate::adapters::database::traits::SqlStore;
use crate::domain::{AggregatorError, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Pings `store` once per entry of `schedule`, waiting that long before each attempt
///
/// # Errors
///
/// Returns [`AggregatorError::Connection`] carrying the last ping error once
/// the schedule is exhausted, or [`AggregatorError::Cancelled`].
pub async fn verify_connectivity(
    store: &dyn SqlStore,
    schedule: &[Duration],
    cancel: &CancellationToken,
) -> Result<()> {
    let max_attempts = schedule.len();
    let mut last_error: Option<AggregatorError> = None;

    for (attempt, wait) in schedule.iter().enumerate() {
        if let Some(error) = &last_error {
            crate::log_retry_attempt!(attempt + 1, max_attempts, error);
        }

        if !wait.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AggregatorError::Cancelled),
                _ = tokio::time::sleep(*wait) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(AggregatorError::Cancelled);
        }

        match store.ping().await {
            Ok(()) => {
                tracing::info!(attempts = attempt + 1, "Database connection established");
                return Ok(());
            }
            Err(e) => last_error = Some(e),
        }
    }

    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "empty retry schedule".to_string());
    Err(AggregatorError::Connection(format!(
        "Failed to connect after {max_attempts} attempt(s): {reason}"
    )))
}

/// Converts a schedule in seconds to durations
pub fn schedule_from_secs(secs: &[u64]) -> Vec<Duration> {
    secs.iter().copied().map(Duration::from_secs).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::traits::RowStream;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyStore {
        failures: usize,
        pings: AtomicUsize,
    }

    #[async_trait]
    impl SqlStore for FlakyStore {
        async fn ping(&self) -> Result<()> {
            let n = self.pings.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(AggregatorError::Connection("connection refused".into()))
            } else {
                Ok(())
            }
        }

        async fn execute(&self, _sql: &str) -> Result<()> {
            Ok(())
        }

        async fn query(&self, _query: &str) -> Result<RowStream> {
            Err(AggregatorError::Database("not supported".into()))
        }
    }

    fn schedule(n: usize) -> Vec<Duration> {
        vec![Duration::from_millis(1); n]
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let store = FlakyStore {
            failures: 2,
            pings: AtomicUsize::new(0),
        };
        verify_connectivity(&store, &schedule(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(store.pings.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_schedule() {
        let store = FlakyStore {
            failures: usize::MAX,
            pings: AtomicUsize::new(0),
        };
        let err = verify_connectivity(&store, &schedule(3), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AggregatorError::Connection(_)));
        assert!(err.to_string().contains("3 attempt(s)"));
        assert_eq!(store.pings.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_ping() {
        let store = FlakyStore {
            failures: 0,
            pings: AtomicUsize::new(0),
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = verify_connectivity(&store, &schedule(1), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(store.pings.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_schedule_from_secs() {
        assert_eq!(
            schedule_from_secs(&[0, 5]),
            vec![Duration::ZERO, Duration::from_secs(5)]
        );
    }
}
