//! Fixed-interval retry

use std::future::Future;
use std::time::Duration;
use tracing::error;

pub const DATABASE_RETRY_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Unlimited attempts with a constant delay
    pub const fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    pub const fn limited(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
        }
    }

    /// Run `op` until it succeeds or the attempt limit is reached.
    ///
    /// Sleeps with `tokio::time`, so a paused test clock drives it.
    pub async fn run<F, Fut, T, E>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if self.max_attempts.is_some_and(|max| attempt >= max) {
                        error!("{} failed after {} attempts: {}", what, attempt, e);
                        return Err(e);
                    }
                    error!(
                        "{} failed: {}. Retrying in {}s.",
                        what,
                        e,
                        self.interval.as_secs_f64()
                    );
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DATABASE_RETRY_INTERVAL)
    }
}
