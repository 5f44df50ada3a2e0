//! Bounded polling for asynchronous cluster state transitions
//!
//! Every wait in the crate goes through [`BoundedPoller`]: snapshot completion,
//! restored indices appearing, the previous snapshot finishing before the next
//! one starts, and merge tasks completing. The poller itself never mutates
//! anything; it only re-runs the caller's check.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{ActionError, ActionResult};

/// Upper bound on a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxWait {
    /// Poll until the check succeeds, however long that takes
    Unbounded,
    /// Give up once this much time has elapsed
    Bounded(Duration),
}

impl MaxWait {
    /// Interpret a seconds value where `-1` is the unbounded sentinel
    pub fn from_secs(secs: i64) -> ActionResult<Self> {
        match secs {
            -1 => Ok(MaxWait::Unbounded),
            s if s >= 0 => Ok(MaxWait::Bounded(Duration::from_secs(s as u64))),
            s => Err(ActionError::Configuration(format!(
                "max_wait must be -1 (no limit) or a non-negative number of seconds, got {}",
                s
            ))),
        }
    }
}

/// Re-checks a condition at a fixed interval until it holds or the bound is exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedPoller {
    interval: Duration,
    max_wait: MaxWait,
}

impl BoundedPoller {
    /// Create a poller
    pub fn new(interval: Duration, max_wait: MaxWait) -> Self {
        Self { interval, max_wait }
    }

    /// Build from the `wait_interval` / `max_wait` seconds options
    pub fn from_secs(wait_interval: u64, max_wait: i64) -> ActionResult<Self> {
        if wait_interval == 0 {
            return Err(ActionError::Configuration(
                "wait_interval must be at least 1 second".to_string(),
            ));
        }
        Ok(Self::new(
            Duration::from_secs(wait_interval),
            MaxWait::from_secs(max_wait)?,
        ))
    }

    /// Interval between checks
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Configured bound
    pub fn max_wait(&self) -> MaxWait {
        self.max_wait
    }

    /// Run `check` until it yields `Some`, returning that value
    ///
    /// The check runs immediately, then after every interval. Errors from the
    /// check end the wait and are returned unchanged. With a bounded wait, a
    /// failed check after the bound has elapsed yields [`ActionError::Timeout`].
    pub async fn poll_until<T, F, Fut>(&self, waiting_for: &str, mut check: F) -> ActionResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ActionResult<Option<T>>>,
    {
        let started = Instant::now();
        let mut attempts: u64 = 0;

        loop {
            attempts += 1;
            if let Some(value) = check().await? {
                debug!(
                    "{} ready after {} check(s) in {:?}",
                    waiting_for,
                    attempts,
                    started.elapsed()
                );
                return Ok(value);
            }

            let elapsed = started.elapsed();
            if let MaxWait::Bounded(limit) = self.max_wait {
                if elapsed >= limit {
                    return Err(ActionError::Timeout {
                        waiting_for: waiting_for.to_string(),
                        elapsed,
                    });
                }
            }

            debug!(
                "Still waiting for {} ({:?} elapsed), next check in {:?}",
                waiting_for, elapsed, self.interval
            );
            sleep(self.interval).await;
        }
    }
}
