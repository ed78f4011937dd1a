use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use trend_core::{CoreError, ErrorExt};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry (in milliseconds)
    pub base_delay_ms: u64,
    /// Ceiling for the exponential part of the delay (in milliseconds)
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Extra random delay as a fraction of the backoff (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 1000,
            max_delay_ms: 16_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.25,
        }
    }
}

/// Retry strategy based on error type
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Don't retry (for permanent failures)
    NoRetry,
}

/// Transient failures are retried, everything else is permanent.
pub fn get_retry_strategy(error: &CoreError) -> RetryStrategy {
    if error.is_retryable() {
        RetryStrategy::Retry
    } else {
        RetryStrategy::NoRetry
    }
}

/// Backoff for the retry that follows failed attempt `attempt` (zero based):
/// `min(base * multiplier^attempt, max)` plus up to `jitter_factor` of that.
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let multiplier = config.backoff_multiplier.powi(attempt as i32);
    let delay_ms = ((config.base_delay_ms as f64 * multiplier) as u64).min(config.max_delay_ms);

    let jitter_range = (delay_ms as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);

    Duration::from_millis(delay_ms + jitter)
}

/// Wraps an operation with retry logic
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of
    /// attempts. The last error is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!("{} succeeded after {} retries", operation_name, attempt);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    debug!(
                        "Attempt {} failed for {}: {}",
                        attempt + 1,
                        operation_name,
                        error
                    );

                    let out_of_attempts = attempt + 1 >= self.config.max_attempts;
                    if get_retry_strategy(&error) == RetryStrategy::NoRetry {
                        debug!("Not retrying {}: {}", operation_name, error);
                        return Err(error);
                    }
                    if out_of_attempts {
                        warn!(
                            "{} failed after {} attempts: {}",
                            operation_name, self.config.max_attempts, error
                        );
                        return Err(error);
                    }

                    let delay = calculate_delay(attempt, &self.config);
                    info!("Retrying {} in {:?} due to: {}", operation_name, delay, error);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
