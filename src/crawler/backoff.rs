//! Retry with exponential backoff for page and sitemap fetches
//!
//! Network failures, timeouts, browser errors and the configured retry
//! statuses are retried. Every other failure, including a render timeout,
//! is returned on the first attempt.

use crate::config::CrawlerConfig;
use crate::FetchError;
use std::future::Future;
use std::time::Duration;

/// When and how often a failed fetch is attempted again
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    pub initial: Duration,
    pub factor: f64,
    pub max: Duration,
    /// HTTP statuses treated as transient
    pub retry_statuses: Vec<u16>,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial: Duration::from_millis(config.backoff_initial_ms),
            factor: config.backoff_factor,
            max: Duration::from_millis(config.backoff_max_ms),
            retry_statuses: config.retry_http_codes.clone(),
        }
    }

    /// A policy that never waits; used by tests
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial: Duration::ZERO,
            factor: 1.0,
            max: Duration::ZERO,
            retry_statuses: vec![408, 429, 500, 502, 503, 504, 404],
        }
    }

    /// Delay slept before retry number `attempt` (0-based): `initial * factor^attempt`, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let millis = self.initial.as_millis() as f64 * self.factor.powi(attempt.min(63) as i32);
        let capped = millis.min(self.max.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Returns `true` if `err` is transient under this policy
    pub fn is_retriable(&self, err: &FetchError) -> bool {
        match err {
            FetchError::Network { .. } | FetchError::Timeout { .. } | FetchError::Browser { .. } => {
                true
            }
            FetchError::Status { status, .. } => self.retry_statuses.contains(status),
            FetchError::Decode { .. }
            | FetchError::RenderTimeout { .. }
            | FetchError::Cancelled { .. } => false,
        }
    }
}

/// Executes `operation`, retrying transient failures with exponential backoff
///
/// With `max_retries = 3` the operation runs at most 4 times. The last error
/// is returned once retries are exhausted.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !policy.is_retriable(&err) || attempt >= policy.max_retries {
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(
            attempt = attempt + 1,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient fetch failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
