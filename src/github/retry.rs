// file: src/github/retry.rs
// description: bounded retry with exponential backoff for transient failures
// reference: explicit attempt counter over a pure delay function

use crate::config::PipelineConfig;
use crate::error::Result;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (zero-based): base · 2^attempt,
    /// capped at `max_delay`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails non-transiently, or the retry budget is
/// spent. The attempt number is passed through for logging.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.next_delay(attempt);
                warn!(
                    "Transient failure (attempt {}/{}), retrying in {:?}: {}",
                    attempt + 1,
                    policy.max_retries + 1,
                    delay,
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_next_delay_doubles() {
        let policy = policy();
        assert_eq!(policy.next_delay(0), Duration::from_millis(100));
        assert_eq!(policy.next_delay(1), Duration::from_millis(200));
        assert_eq!(policy.next_delay(2), Duration::from_millis(400));
        assert_eq!(policy.next_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_next_delay_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        };
        assert_eq!(policy.next_delay(2), Duration::from_secs(4));
        assert_eq!(policy.next_delay(3), Duration::from_secs(8));
        assert_eq!(policy.next_delay(9), Duration::from_secs(8));
        // large attempt numbers must not overflow
        assert_eq!(policy.next_delay(40), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds_with_doubling_delays() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();
        let timestamps = Arc::new(std::sync::Mutex::new(Vec::new()));

        let result = with_retry(&policy(), |_attempt| {
            let calls = calls.clone();
            let timestamps = timestamps.clone();
            async move {
                timestamps.lock().unwrap().push(start.elapsed());
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(PipelineError::Fetch("503".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        // call instants: 0, 100ms, 300ms, 700ms; gaps double each time
        let timestamps = timestamps.lock().unwrap();
        let gaps: Vec<Duration> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_surfaces_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let short = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        };

        let result: Result<()> = with_retry(&short, |_attempt| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(PipelineError::Fetch("timeout".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<()> = with_retry(&policy(), |_attempt| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(PipelineError::Authorization("bad token".to_string()))
            }
        })
        .await;

        assert!(matches!(result, Err(PipelineError::Authorization(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
