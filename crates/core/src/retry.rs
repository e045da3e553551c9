//! Retry-with-backoff shared by channel search, page listing and view-count
//! batching, so the three call sites cannot drift apart.

use std::{future::Future, time::Duration};

use rand::Rng;
use tracing::warn;

use crate::{
    abort::AbortFlag,
    error::{HarvestError, Result},
};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// `None` retries until the operation succeeds or the run is aborted.
    pub max_attempts: Option<u32>,
    pub base_delay: Duration,
    /// Upper bound of the uniform random extra added to `base_delay`.
    pub jitter: Duration,
    pub retryable: fn(&HarvestError) -> bool,
}

impl RetryPolicy {
    /// Channel search: 8 attempts per query variant, 500–1000ms between them.
    pub fn channel_search() -> Self {
        Self {
            max_attempts: Some(8),
            base_delay: Duration::from_millis(500),
            jitter: Duration::from_millis(500),
            retryable: HarvestError::is_transient,
        }
    }

    /// Channel video listing: retry the same page until it works, 800–1400ms apart.
    pub fn page_listing() -> Self {
        Self {
            max_attempts: None,
            base_delay: Duration::from_millis(800),
            jitter: Duration::from_millis(600),
            retryable: HarvestError::is_transient,
        }
    }

    pub fn view_counts() -> Self {
        Self {
            max_attempts: Some(3),
            ..Self::page_listing()
        }
    }

    pub fn with_delay(mut self, base_delay: Duration, jitter: Duration) -> Self {
        self.base_delay = base_delay;
        self.jitter = jitter;
        self
    }

    pub fn delay(&self) -> Duration {
        self.base_delay + random_up_to(self.jitter)
    }

    pub async fn backoff(&self) {
        tokio::time::sleep(self.delay()).await;
    }

    pub fn allows_attempt(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, runs out
    /// of attempts or `abort` is set.
    pub async fn run<T, F, Fut>(&self, what: &str, abort: &AbortFlag, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            if abort.is_aborted() {
                return Err(HarvestError::Aborted);
            }
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if (self.retryable)(&e) && self.allows_attempt(attempt) => {
                    warn!(attempt, error = %e, "{what} failed, backing off");
                    self.backoff().await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Courtesy delay between requests: `base` plus up to `jitter` extra.
pub async fn pause(base: Duration, jitter: Duration) {
    tokio::time::sleep(base + random_up_to(jitter)).await;
}

fn random_up_to(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}
