//! Retry with exponential backoff and jitter.
//!
//! Used by the first-run registration, where nobody is waiting on the
//! result and a flaky network at app start should not cost the device its
//! push registration until the next reinstall.

use crate::config::RegistrationConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one). Zero is treated as one.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// Exponential base (typically 2.0 for doubling).
    pub exponential_base: f64,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RegistrationConfig::INITIAL_ATTEMPTS,
            base_delay: RegistrationConfig::INITIAL_BASE_DELAY,
            max_delay: RegistrationConfig::INITIAL_MAX_DELAY,
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Backoff before retrying after failed attempt `attempt` (0-indexed).
    ///
    /// Jitter scales the delay by a factor in `0.5..1.5`; the result never
    /// exceeds `max_delay`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let max = self.max_delay.as_secs_f64();
        let exponential = self.base_delay.as_secs_f64() * self.exponential_base.powi(attempt as i32);
        let factor = if self.jitter {
            rand::rng().random_range(0.5..1.5)
        } else {
            1.0
        };
        Duration::from_secs_f64((exponential.min(max) * factor).min(max))
    }
}

/// Outcome of [`retry_async`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryStats {
    /// Attempts made, including the last one.
    pub attempts: u32,
    pub success: bool,
}

/// Retry an async operation with exponential backoff.
///
/// Stops at the first success, at the first error `should_retry` rejects, or
/// when the attempts run out. The last error is returned in that case.
pub async fn retry_async<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
) -> (Result<T, E>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);

    let mut attempt = 1;
    loop {
        let stats = RetryStats {
            attempts: attempt,
            success: false,
        };

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("Succeeded on attempt {}/{}", attempt, max_attempts);
                }
                return (Ok(value), RetryStats { success: true, ..stats });
            }
            Err(e) if !should_retry(&e) => {
                debug!("Giving up on non-retryable error: {}", e);
                return (Err(e), stats);
            }
            Err(e) if attempt == max_attempts => {
                warn!("Giving up after {} attempts: {}", max_attempts, e);
                return (Err(e), stats);
            }
            Err(e) => {
                let delay = config.calculate_delay(attempt - 1);
                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PushError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_calculation_no_jitter() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_secs(2))
            .with_jitter(false);

        assert_eq!(config.calculate_delay(0), Duration::from_secs(2));
        assert_eq!(config.calculate_delay(1), Duration::from_secs(4));
        assert_eq!(config.calculate_delay(2), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig {
            max_delay: Duration::from_secs(30),
            ..RetryConfig::new()
                .with_base_delay(Duration::from_secs(10))
                .with_jitter(false)
        };

        assert_eq!(config.calculate_delay(3), Duration::from_secs(30));
    }

    #[test]
    fn test_delay_with_jitter_stays_in_band() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_secs(2))
            .with_jitter(true);

        for _ in 0..20 {
            let delay = config.calculate_delay(0);
            assert!(
                delay >= Duration::from_secs(1) && delay <= Duration::from_secs(3),
                "Delay {:?} should be between 1s and 3s",
                delay
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_directory_outage() {
        let config = RetryConfig::new().with_max_attempts(3).with_jitter(false);
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let (result, stats) = retry_async(
            &config,
            || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(PushError::directory(
                            "create_endpoint",
                            anyhow::anyhow!("service unavailable"),
                        ))
                    } else {
                        Ok("E1")
                    }
                }
            },
            PushError::is_retryable,
        )
        .await;

        assert_eq!(result.unwrap(), "E1");
        assert_eq!(stats.attempts, 3);
        assert!(stats.success);
        // 2s + 4s of backoff
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted() {
        let config = RetryConfig::new().with_max_attempts(2).with_jitter(false);

        let (result, stats) = retry_async(
            &config,
            || async { Err::<(), _>(PushError::registration(anyhow::anyhow!("offline"))) },
            PushError::is_retryable,
        )
        .await;

        assert!(matches!(result, Err(PushError::Registration { .. })));
        assert_eq!(stats.attempts, 2);
        assert!(!stats.success);
        assert!(result.unwrap_err().to_string().contains("offline"));
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let config = RetryConfig::new().with_max_attempts(3);

        let (result, stats) = retry_async(
            &config,
            || async { Err::<(), _>(PushError::NotRegistered) },
            PushError::is_retryable,
        )
        .await;

        assert!(matches!(result, Err(PushError::NotRegistered)));
        assert_eq!(stats.attempts, 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let config = RetryConfig::new().with_max_attempts(0);

        let (result, stats) =
            retry_async(&config, || async { Ok::<_, PushError>(7) }, PushError::is_retryable)
                .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(stats.attempts, 1);
    }
}
