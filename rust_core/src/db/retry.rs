//! Retry wrapper for transient database failures.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const BASE_DELAY: Duration = Duration::from_millis(100);
const MAX_DELAY: Duration = Duration::from_secs(2);

/// Phrases that mark an error as transient. By the time an error reaches
/// this layer sqlx has flattened driver and server failures into strings,
/// so classification is textual.
const TRANSIENT_MARKERS: &[&str] = &[
    "connection",
    "timeout",
    "broken pipe",
    "could not serialize",
    "deadlock detected",
    "too many clients",
    "server closed the connection",
];

fn is_transient(e: &anyhow::Error) -> bool {
    let msg = e.to_string().to_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| msg.contains(m))
}

/// Run a database operation, retrying transient failures with a doubling
/// delay. Anything that does not look transient fails on the spot.
pub async fn execute_with_retry<F, Fut, T>(mut op: F, max_attempts: u32) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut delay = BASE_DELAY;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_attempts && is_transient(&e) => {
                warn!(
                    "transient db error (attempt {}/{}), retrying in {:?}: {}",
                    attempt, max_attempts, delay, e
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&anyhow::anyhow!("connection reset by peer")));
        assert!(is_transient(&anyhow::anyhow!("statement timeout")));
        assert!(is_transient(&anyhow::anyhow!("deadlock detected")));
        assert!(is_transient(&anyhow::anyhow!("FATAL: too many clients already")));

        assert!(!is_transient(&anyhow::anyhow!("duplicate key value violates unique constraint")));
        assert!(!is_transient(&anyhow::anyhow!("column \"foo\" does not exist")));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<i32> = execute_with_retry(
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(anyhow::anyhow!("connection timeout"))
                    } else {
                        Ok(42)
                    }
                }
            },
            3,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_hard_error_fails_immediately() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<i32> = execute_with_retry(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("invalid input syntax"))
                }
            },
            3,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_last_error() {
        let result: Result<i32> =
            execute_with_retry(|| async { Err(anyhow::anyhow!("connection refused")) }, 2).await;
        assert!(result.unwrap_err().to_string().contains("connection refused"));
    }
}
