//! Fetch scheduling and rate limiting
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore
//! - Per-domain concurrency limiting via one semaphore per host
//! - The download delay between successive fetches of a worker, with
//!   optional randomisation

use crate::config::CrawlerConfig;
use crate::url::domain_of;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Permission to run one fetch; released on drop
pub struct FetchPermit {
    _domain: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

/// Gatekeeper shared by all workers
///
/// A fetch holds a per-domain permit and a global permit for its whole
/// duration, retries included. The domain permit is taken first so a
/// worker queued behind a busy host does not occupy a global slot.
pub struct Scheduler {
    global: Arc<Semaphore>,
    per_domain: Mutex<HashMap<String, Arc<Semaphore>>>,
    per_domain_limit: usize,
    delay: Duration,
    randomize: bool,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            global: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            per_domain: Mutex::new(HashMap::new()),
            per_domain_limit: config.max_concurrent_per_domain,
            delay: config.download_delay(),
            randomize: config.randomize_delay,
        }
    }

    /// Waits until a fetch of `url` may start
    ///
    /// # Returns
    ///
    /// * `Some(FetchPermit)` - Hold it until the fetch completes
    /// * `None` - The scheduler was shut down
    pub async fn acquire(&self, url: &str) -> Option<FetchPermit> {
        let domain = domain_of(url).unwrap_or_default();
        let domain_semaphore = self.domain_semaphore(&domain);

        let domain_permit = domain_semaphore.acquire_owned().await.ok()?;
        let global_permit = Arc::clone(&self.global).acquire_owned().await.ok()?;

        tracing::trace!(
            "Fetch slot granted for {} ({} global slots left)",
            domain,
            self.global.available_permits()
        );

        Some(FetchPermit {
            _domain: domain_permit,
            _global: global_permit,
        })
    }

    /// Delay a worker sleeps before its next fetch
    ///
    /// With randomisation enabled the configured delay is scaled by a
    /// uniform factor in `0.5..1.5`.
    pub fn next_delay(&self) -> Duration {
        if !self.randomize || self.delay.is_zero() {
            return self.delay;
        }

        let factor: f64 = rand::rng().random_range(0.5..1.5);
        self.delay.mul_f64(factor)
    }

    /// Stops handing out permits; pending and future `acquire` calls return `None`
    pub fn close(&self) {
        self.global.close();
    }

    fn domain_semaphore(&self, domain: &str) -> Arc<Semaphore> {
        let mut domains = match self.per_domain.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        Arc::clone(
            domains
                .entry(domain.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.per_domain_limit))),
        )
    }
}
