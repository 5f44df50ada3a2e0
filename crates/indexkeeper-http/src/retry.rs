//! Retry with exponential backoff for read-only cluster calls

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::{config::HttpConfig, error::HttpError, Result};

/// Backoff never grows past this
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How often and how patiently a read is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Delay before the first retry; doubles for each further one
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for RetryPolicy {
    fn from(config: &HttpConfig) -> Self {
        Self {
            retries: config.retry_count,
            base_delay: config.retry_delay,
            max_delay: MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Policy that gives up on the first failure
    pub fn never() -> Self {
        Self {
            retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `retry` (0-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Run `operation`, retrying transient failures
    ///
    /// Only errors for which [`HttpError::is_retryable`] holds are retried.
    /// Once the retries are spent the last error is wrapped in
    /// [`HttpError::RetryLimitExceeded`]. A policy without retries returns
    /// the first error as it is.
    pub async fn run<F, Fut, T>(&self, what: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            let error = match operation().await {
                Ok(value) => {
                    if retry > 0 {
                        debug!("{} succeeded after {} retr(ies)", what, retry);
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            if self.retries == 0 {
                return Err(error);
            }
            if retry >= self.retries {
                return Err(HttpError::RetryLimitExceeded {
                    attempts: retry + 1,
                    last_error: error.to_string(),
                });
            }

            let delay = self.backoff(retry);
            warn!(
                "{} failed ({}/{}), retrying in {:?}: {}",
                what,
                retry + 1,
                self.retries + 1,
                delay,
                error
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}
