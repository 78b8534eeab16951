use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Classification of errors for retry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryableError {
    /// 429 Rate Limit
    RateLimit,
    /// 5xx or upstream envelope error
    ServerError,
    /// Network timeout / connection failure
    Timeout,
    /// Other errors - don't retry
    Other,
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt (milliseconds)
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff delay (milliseconds)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Backoff after the failed attempt with 0-based index `attempt`:
    /// `min(max_delay_ms, base_delay_ms * 2^attempt)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Retry an async operation with capped exponential backoff
///
/// # Arguments
/// * `operation` - The async operation to retry (should be a closure that returns a Future)
/// * `config` - Retry configuration
/// * `classify_error` - Function to classify errors for retry strategy
///
/// # Returns
/// * `Ok(T)` - Operation succeeded (either on first attempt or after retries)
/// * `Err(E)` - Operation failed after all attempts were exhausted, or with a non-retryable error
///
/// # Example
/// ```ignore
/// let result = retry_with_backoff(
///     || async { my_api_call().await },
///     &RetryConfig::default(),
///     |e| if e.is_rate_limit() { RetryableError::RateLimit } else { RetryableError::Other }
/// ).await;
/// ```
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    config: &RetryConfig,
    classify_error: impl Fn(&E) -> RetryableError,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("✅ Operation succeeded after {} retry attempts", attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                let error_type = classify_error(&e);

                if error_type == RetryableError::Other {
                    error!("❌ Operation failed with non-retryable error: {}", e);
                    return Err(e);
                }

                if attempt + 1 >= max_attempts {
                    error!(
                        "❌ Operation failed after {} attempts (max attempts exhausted): {}",
                        attempt + 1,
                        e
                    );
                    return Err(e);
                }

                let delay = config.delay_for(attempt);

                warn!(
                    "⚠️  Operation failed (attempt {}/{}): {} - Retrying in {}ms (error type: {:?})",
                    attempt + 1,
                    max_attempts,
                    e,
                    delay.as_millis(),
                    error_type
                );

                tokio::time::sleep(delay).await;

                attempt += 1;
            }
        }
    }
}
