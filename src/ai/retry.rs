//! Retry logic with exponential backoff

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::error::{ErrorKind, ProviderError};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,

    /// Initial delay between retries (milliseconds)
    pub initial_delay_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Maximum delay between retries (milliseconds)
    pub max_delay_ms: u64,

    /// Timeout for each individual call
    pub call_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
            call_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryConfig {
    /// Create a config with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        Duration::from_millis(capped_delay as u64)
    }
}

/// Classifies an error for retry decisions.
///
/// Only [`ProviderError`]s can be transient; anything else is treated as
/// permanent.
pub fn classify(error: &anyhow::Error) -> ErrorKind {
    error
        .downcast_ref::<ProviderError>()
        .map_or(ErrorKind::Permanent, ProviderError::kind)
}

/// Execute an async operation with a per-call timeout and retry logic
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        let outcome = match timeout(config.call_timeout, operation()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProviderError::Timeout(config.call_timeout).into()),
        };

        match outcome {
            Ok(result) => return Ok(result),
            Err(e) => {
                if classify(&e) == ErrorKind::Permanent {
                    debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        error = %e,
                        "Non-retryable error"
                    );
                    return Err(e);
                }

                if attempt >= config.max_retries {
                    warn!(
                        operation = operation_name,
                        max_retries = config.max_retries,
                        error = %e,
                        "Max retries exceeded"
                    );
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
