use std::time::Duration;
use std::future::Future;

use super::classification::ErrorClassification;
use super::types::AttestError;
use tracing::warn;

impl ErrorClassification {
    /// Calculate the retry delay for this error classification based on the
    /// current attempt number (0-indexed) and the configured base delay.
    ///
    /// - PersistenceConflict: linear `base * (attempt + 1)`, capped at 2s
    /// - Default: exponential `base * 2^attempt` plus up to one base of jitter, capped at 30s
    pub fn retry_delay(&self, attempt: u32, base: Duration) -> Duration {
        match self.error_type {
            "PersistenceConflict" => {
                let delay = base * (attempt + 1);
                delay.min(Duration::from_secs(2))
            }
            _ => {
                let factor: f64 = 2.0_f64.powi(attempt as i32);
                let jitter: f64 = rand::random::<f64>();
                let secs = (base.as_secs_f64() * (factor + jitter)).min(30.0);
                Duration::from_secs_f64(secs)
            }
        }
    }
}

/// Retry configuration for external collaborators (database busy, webhooks).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    pub fn none() -> Self {
        Self { max_retries: 0, base_delay: Duration::ZERO }
    }

    /// Short linear backoff for SQLite busy/locked writes.
    pub fn persistence() -> Self {
        Self { max_retries: 3, base_delay: Duration::from_millis(50) }
    }
}

/// Execute an async operation with retry logic.
///
/// Retries only if the error is classified as retryable and we haven't
/// exceeded max_retries.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    mut factory: F,
) -> Result<T, AttestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttestError>>,
{
    let max_attempts = config.max_retries + 1;
    let mut last_error = None;

    for attempt in 0..max_attempts {
        match factory().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let classification = e.classify();

                if !classification.retryable || attempt + 1 >= max_attempts {
                    if !classification.retryable {
                        warn!(
                            operation = operation_name,
                            error_type = classification.error_type,
                            "Non-retryable error, failing immediately"
                        );
                    } else {
                        warn!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            max = max_attempts,
                            "Max retries exhausted"
                        );
                    }
                    return Err(e);
                }

                let delay = classification.retry_delay(attempt, config.base_delay);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max = max_attempts,
                    error_type = classification.error_type,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after error"
                );

                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AttestError::Internal("Retry loop exited unexpectedly".into())))
}

/// Run a synchronous database write under `with_retry`.
pub async fn retry_write<T, F>(operation_name: &str, config: &RetryConfig, mut write: F) -> Result<T, AttestError>
where
    F: FnMut() -> Result<T, AttestError>,
{
    with_retry(operation_name, config, || std::future::ready(write())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_delay_persistence_conflict_linear() {
        let class = ErrorClassification { error_type: "PersistenceConflict", retryable: true };
        let base = Duration::from_millis(100);
        assert_eq!(class.retry_delay(0, base), Duration::from_millis(100));
        assert_eq!(class.retry_delay(2, base), Duration::from_millis(300));
        assert_eq!(class.retry_delay(100, base), Duration::from_secs(2)); // capped
    }

    #[test]
    fn test_retry_delay_default_exponential() {
        let class = ErrorClassification { error_type: "NetworkError", retryable: true };
        let base = Duration::from_secs(1);
        let d0 = class.retry_delay(0, base);
        let d1 = class.retry_delay(1, base);
        assert!(d0.as_secs_f64() >= 1.0 && d0.as_secs_f64() < 2.0);
        assert!(d1.as_secs_f64() >= 2.0 && d1.as_secs_f64() < 3.0);
    }

    #[tokio::test]
    async fn test_with_retry_succeeds_first_try() {
        let result = with_retry("test", &RetryConfig::default(), || async {
            Ok::<_, AttestError>(42)
        }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_retry_non_retryable_fails_immediately() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let config = RetryConfig { max_retries: 3, base_delay: Duration::ZERO };

        let result = with_retry("test", &config, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AttestError::InvalidInput("bad mapping".into()))
            }
        }).await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_recovers_after_transient_errors() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let config = RetryConfig { max_retries: 3, base_delay: Duration::ZERO };

        let result = with_retry("test", &config, || {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(AttestError::Network("reset".into()))
                } else {
                    Ok(n)
                }
            }
        }).await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_none_makes_single_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry("test", &RetryConfig::none(), || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AttestError::Network("timeout".into()))
            }
        }).await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_write_rides_out_busy_database() {
        let mut attempts = 0;
        let config = RetryConfig { max_retries: 3, base_delay: Duration::ZERO };
        let result = retry_write("checklist_upsert", &config, || {
            attempts += 1;
            if attempts < 3 {
                Err(AttestError::PersistenceConflict("database is locked".into()))
            } else {
                Ok(attempts)
            }
        }).await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_retry_write_passes_not_found_through() {
        let mut attempts = 0;
        let result = retry_write("finding_upsert", &RetryConfig::persistence(), || {
            attempts += 1;
            Err::<(), _>(AttestError::NotFound("audit 7".into()))
        }).await;
        assert!(matches!(result, Err(AttestError::NotFound(_))));
        assert_eq!(attempts, 1);
    }
}
