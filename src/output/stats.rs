//! Run statistics
//!
//! A single [`RunStats`] is shared by the producer, the workers and the writer
//! through an `Arc`. Counters are plain atomics; failed pages are also kept
//! in a small ledger grouped by reason. A [`StatsSnapshot`] is taken at the
//! end of the run for the summary and the exit status.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Named counters of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Sitemap entries seen
    Discovered,
    Products,
    Categories,
    Ignored,
    /// Sitemap documents that could not be loaded or parsed
    SitemapFailures,
    Fetched,
    FetchFailed,
    /// Subset of `FetchFailed` caused by the wait selector never appearing
    RenderTimeouts,
    Extracted,
    ExtractionFailed,
    RecordsEmitted,
    /// Pages on which color variants were found
    VariantPages,
    VariantFailures,
    VariantDetectionFailed,
}

const COUNTERS: usize = 14;

impl Counter {
    fn index(self) -> usize {
        self as usize
    }
}

/// Shared atomic counters of one sweep
#[derive(Debug)]
pub struct RunStats {
    counters: [AtomicU64; COUNTERS],
    failures: Mutex<BTreeMap<String, Vec<String>>>,
    started: Instant,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
            failures: Mutex::new(BTreeMap::new()),
            started: Instant::now(),
        }
    }

    /// Increments a counter by one
    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, n: u64) {
        self.counters[counter.index()].fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    /// Records a failed URL under `reason`
    ///
    /// Only records the failure; the matching counter is incremented
    /// separately by the caller.
    pub fn record_failure(&self, reason: impl Into<String>, url: impl Into<String>) {
        let mut failures = match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        failures.entry(reason.into()).or_default().push(url.into());
    }

    fn failures(&self) -> BTreeMap<String, Vec<String>> {
        match self.failures.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Takes a consistent-enough copy of every counter
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            discovered: self.get(Counter::Discovered),
            products: self.get(Counter::Products),
            categories: self.get(Counter::Categories),
            ignored: self.get(Counter::Ignored),
            sitemap_failures: self.get(Counter::SitemapFailures),
            fetched: self.get(Counter::Fetched),
            fetch_failed: self.get(Counter::FetchFailed),
            render_timeouts: self.get(Counter::RenderTimeouts),
            extracted: self.get(Counter::Extracted),
            extraction_failed: self.get(Counter::ExtractionFailed),
            records_emitted: self.get(Counter::RecordsEmitted),
            variant_pages: self.get(Counter::VariantPages),
            variant_failures: self.get(Counter::VariantFailures),
            variant_detection_failed: self.get(Counter::VariantDetectionFailed),
            failures: self.failures(),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub discovered: u64,
    pub products: u64,
    pub categories: u64,
    pub ignored: u64,
    pub sitemap_failures: u64,
    pub fetched: u64,
    pub fetch_failed: u64,
    pub render_timeouts: u64,
    pub extracted: u64,
    pub extraction_failed: u64,
    pub records_emitted: u64,
    pub variant_pages: u64,
    pub variant_failures: u64,
    pub variant_detection_failed: u64,
    /// Failed page and variant URLs grouped by reason
    pub failures: BTreeMap<String, Vec<String>>,
    pub elapsed: Duration,
}

impl StatsSnapshot {
    /// Product pages that reached a terminal fetch outcome
    pub fn attempted(&self) -> u64 {
        self.fetched + self.fetch_failed
    }

    /// Product pages that ended in a fetch or extraction failure
    pub fn failed(&self) -> u64 {
        self.fetch_failed + self.extraction_failed
    }

    /// Failed pages over attempted pages, in `0.0..=1.0`
    pub fn failure_rate(&self) -> f64 {
        let attempted = self.attempted();
        if attempted == 0 {
            return 0.0;
        }
        self.failed() as f64 / attempted as f64
    }
}

/// Prints the run summary to stdout
pub fn print_summary(stats: &StatsSnapshot) {
    println!("=== Sweep Summary ===\n");

    println!("Discovery:");
    println!("  Sitemap entries: {}", stats.discovered);
    println!("  Product URLs: {}", stats.products);
    println!("  Category URLs (not followed): {}", stats.categories);
    println!("  Ignored URLs: {}", stats.ignored);
    if stats.sitemap_failures > 0 {
        println!("  Failed sitemaps: {}", stats.sitemap_failures);
    }
    println!();

    println!("Pages:");
    println!("  Fetched: {}", stats.fetched);
    println!(
        "  Fetch failures: {} ({} render timeouts)",
        stats.fetch_failed, stats.render_timeouts
    );
    println!("  Extracted: {}", stats.extracted);
    println!("  Extraction failures: {}", stats.extraction_failed);
    println!();

    println!("Variants:");
    println!("  Pages with colors: {}", stats.variant_pages);
    println!("  Detection failures: {}", stats.variant_detection_failed);
    println!("  Variant failures: {}", stats.variant_failures);
    println!();

    if !stats.failures.is_empty() {
        println!("Failures by reason:");
        for (reason, urls) in &stats.failures {
            println!("  {} ({}):", reason, urls.len());
            for url in urls {
                println!("    - {}", url);
            }
        }
        println!();
    }

    println!(
        "Records emitted: {} in {:.1}s (failure rate {:.1}%)",
        stats.records_emitted,
        stats.elapsed.as_secs_f64(),
        stats.failure_rate() * 100.0
    );
}
