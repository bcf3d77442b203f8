//! Sweep coordinator - main pipeline orchestration
//!
//! This module wires the pipeline together:
//! - A producer task streams sitemap entries and classifies them
//! - A bounded pool of workers fetches, extracts and expands product pages
//! - A single writer task owns the output sink
//! - A stop flag ends the run on the item limit or Ctrl-C

use crate::config::{BrandConfig, Config, FetchStrategy};
use crate::crawler::blocking::BlockRule;
use crate::crawler::fetcher::{FetchedPage, HttpFetcher};
use crate::crawler::renderer::{render_page, RenderPlan, Renderer};
use crate::crawler::{retry_with_backoff, Scheduler};
use crate::extract::{Extractor, PageExtraction, ProductRecord, VariantDetection};
use crate::output::{create_sink, Counter, RecordSink, RunStats, StatsSnapshot};
use crate::sitemap::SitemapLoader;
use crate::state::UrlState;
use crate::url::{UrlClass, UrlClassifier};
use crate::variant::{expand_in_place, filter_gallery, variant_record};
use crate::{ConfigError, FetchError, SitemapError, SweepError};
use futures::StreamExt;
use regex::Regex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

const RECORD_BUFFER: usize = 256;

/// Everything compiled from one `[[brand]]` table
///
/// Built once at startup and shared read-only by the producer and workers.
#[derive(Debug)]
pub struct BrandProfile {
    pub name: String,
    pub sitemaps: Vec<String>,
    pub strategy: FetchStrategy,
    pub classifier: UrlClassifier,
    pub extractor: Extractor,
    pub loader: SitemapLoader,
    /// Present for rendered brands
    pub render_plan: Option<Arc<RenderPlan>>,
    /// Fetch each variant URL instead of filtering the base gallery
    pub refetch_variants: bool,
    pub image_markers: Vec<String>,
}

impl BrandProfile {
    /// Compiles a brand table
    ///
    /// # Arguments
    ///
    /// * `brand` - The brand configuration
    /// * `config` - The full configuration, for renderer timeouts
    /// * `fetcher` - HTTP fetcher shared with the sitemap loader
    pub fn compile(
        brand: &BrandConfig,
        config: &Config,
        fetcher: HttpFetcher,
    ) -> Result<Self, ConfigError> {
        let nested_filter = brand
            .nested_sitemap_pattern
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e)))
            })
            .transpose()?;

        let render_plan = match brand.strategy {
            FetchStrategy::Rendered => Some(Arc::new(RenderPlan {
                wait_for: brand.wait_for.clone().unwrap_or_default(),
                block: Arc::new(BlockRule::from_config(&brand.block)),
                timeout: config.renderer.wait_timeout(),
            })),
            FetchStrategy::Static => None,
        };

        let (refetch_variants, image_markers) = match &brand.variants {
            Some(variants) => (variants.images.refetch, variants.images.markers.clone()),
            None => (false, Vec::new()),
        };

        Ok(Self {
            name: brand.name.clone(),
            sitemaps: brand.sitemaps.clone(),
            strategy: brand.strategy,
            classifier: UrlClassifier::from_routes(&brand.routes)?,
            extractor: Extractor::from_brand(brand)?,
            loader: SitemapLoader::new(fetcher, nested_filter),
            render_plan,
            refetch_variants,
            image_markers,
        })
    }
}

/// A product URL waiting for a worker
struct WorkItem {
    profile: Arc<BrandProfile>,
    url: String,
    state: UrlState,
}

/// Shared by every worker
struct WorkerContext {
    fetcher: HttpFetcher,
    scheduler: Arc<Scheduler>,
    renderer: Option<Arc<Renderer>>,
    stats: Arc<RunStats>,
    stop: Arc<AtomicBool>,
    records: mpsc::Sender<ProductRecord>,
}

/// Main sweep coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    profiles: Vec<Arc<BrandProfile>>,
    fetcher: HttpFetcher,
    scheduler: Arc<Scheduler>,
    renderer: Option<Arc<Renderer>>,
    stats: Arc<RunStats>,
    stop: Arc<AtomicBool>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// The headless browser is launched only if a configured brand uses the
    /// rendered strategy.
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(SweepError)` - A brand failed to compile, or the browser failed to start
    pub fn new(config: Config) -> Result<Self, SweepError> {
        let fetcher = HttpFetcher::from_config(&config.crawler, &config.user_agent.value)?;

        let renderer = if config.uses_renderer() {
            tracing::info!("Launching headless browser");
            Some(Arc::new(Renderer::launch(
                &config.renderer,
                &config.user_agent.value,
            )?))
        } else {
            None
        };

        Self::with_parts(config, fetcher, renderer)
    }

    /// Creates a coordinator from an existing fetcher and optional browser
    pub fn with_parts(
        config: Config,
        fetcher: HttpFetcher,
        renderer: Option<Arc<Renderer>>,
    ) -> Result<Self, SweepError> {
        let profiles = config
            .brands
            .iter()
            .map(|brand| BrandProfile::compile(brand, &config, fetcher.clone()).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            scheduler: Arc::new(Scheduler::new(&config.crawler)),
            config: Arc::new(config),
            profiles,
            fetcher,
            renderer,
            stats: Arc::new(RunStats::new()),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that ends the run when set
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stats(&self) -> Arc<RunStats> {
        Arc::clone(&self.stats)
    }

    /// Counts into `stats` instead of a fresh set of counters
    pub fn with_stats(mut self, stats: Arc<RunStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Runs the sweep to completion and writes every record into `sink`
    ///
    /// # Returns
    ///
    /// * `Ok(StatsSnapshot)` - Final counters
    /// * `Err(SweepError)` - A sitemap root was unreachable or the output failed
    pub async fn run(self, sink: Box<dyn RecordSink + Send>) -> Result<StatsSnapshot, SweepError> {
        let workers = self.config.crawler.max_concurrent_requests.max(1);
        tracing::info!(
            "Starting sweep of {} brand(s) with {} workers",
            self.profiles.len(),
            workers
        );

        let (work_tx, work_rx) = mpsc::channel::<WorkItem>(workers * 2);
        let (record_tx, record_rx) = mpsc::channel::<ProductRecord>(RECORD_BUFFER);

        let writer = spawn_writer(
            sink,
            record_rx,
            self.config.crawler.max_items,
            Arc::clone(&self.stats),
            Arc::clone(&self.stop),
        );

        let producer = tokio::spawn(produce(
            self.profiles.clone(),
            work_tx,
            Arc::clone(&self.stats),
            Arc::clone(&self.stop),
        ));

        let context = Arc::new(WorkerContext {
            fetcher: self.fetcher.clone(),
            scheduler: Arc::clone(&self.scheduler),
            renderer: self.renderer.clone(),
            stats: Arc::clone(&self.stats),
            stop: Arc::clone(&self.stop),
            records: record_tx,
        });
        let work_rx = Arc::new(Mutex::new(work_rx));
        let handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|id| tokio::spawn(work(id, Arc::clone(&context), Arc::clone(&work_rx))))
            .collect();
        drop(context);
        drop(work_rx);

        let produced = producer.await?;
        if produced.is_err() {
            self.stop.store(true, Ordering::SeqCst);
            self.scheduler.close();
        }

        for handle in handles {
            handle.await?;
        }
        let written = writer.await??;

        produced?;

        let snapshot = self.stats.snapshot();
        tracing::info!(
            "Sweep finished: {} records written, {} product pages failed",
            written,
            snapshot.failed()
        );
        Ok(snapshot)
    }
}

/// Streams every brand's sitemaps and queues product URLs
async fn produce(
    profiles: Vec<Arc<BrandProfile>>,
    work: mpsc::Sender<WorkItem>,
    stats: Arc<RunStats>,
    stop: Arc<AtomicBool>,
) -> Result<(), SweepError> {
    let mut seen = HashSet::new();

    for profile in profiles {
        for root in &profile.sitemaps {
            if stop.load(Ordering::SeqCst) {
                return Ok(());
            }
            tracing::info!("[{}] Loading sitemap {}", profile.name, root);

            let mut entries = match profile.loader.open(root).await {
                Ok(entries) => entries,
                Err(source @ SitemapError::Fetch(_)) => {
                    return Err(SweepError::SitemapRoot {
                        url: root.clone(),
                        source,
                    });
                }
                Err(e) => {
                    tracing::error!("[{}] Skipping sitemap {}: {}", profile.name, root, e);
                    stats.incr(Counter::SitemapFailures);
                    stats.record_failure("malformed sitemap", root.as_str());
                    continue;
                }
            };

            while let Some(entry) = entries.next().await {
                if stop.load(Ordering::SeqCst) {
                    return Ok(());
                }

                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!("[{}] Skipping nested sitemap: {}", profile.name, e);
                        stats.incr(Counter::SitemapFailures);
                        stats.record_failure(sitemap_reason(&e), sitemap_url(&e));
                        continue;
                    }
                };
                stats.incr(Counter::Discovered);

                match profile.classifier.classify(&entry.loc) {
                    UrlClass::Product => {
                        if !seen.insert(entry.loc.clone()) {
                            continue;
                        }
                        stats.incr(Counter::Products);
                        let item = WorkItem {
                            profile: Arc::clone(&profile),
                            state: UrlState::Discovered.transition(UrlState::Classified)?,
                            url: entry.loc,
                        };
                        if work.send(item).await.is_err() {
                            return Ok(());
                        }
                    }
                    UrlClass::Category => {
                        tracing::trace!("[{}] Category {}", profile.name, entry.loc);
                        stats.incr(Counter::Categories);
                    }
                    UrlClass::Ignored => stats.incr(Counter::Ignored),
                }
            }
        }
    }

    Ok(())
}

fn sitemap_reason(err: &SitemapError) -> &'static str {
    match err {
        SitemapError::Fetch(_) => "unreachable sitemap",
        SitemapError::Parse { .. } => "malformed sitemap",
    }
}

fn sitemap_url(err: &SitemapError) -> &str {
    match err {
        SitemapError::Fetch(e) => e.url(),
        SitemapError::Parse { url, .. } => url,
    }
}

/// Worker loop: one product URL at a time until the queue closes or the run stops
async fn work(id: usize, context: Arc<WorkerContext>, queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>) {
    loop {
        if context.stop.load(Ordering::SeqCst) {
            break;
        }

        let item = {
            let mut queue = queue.lock().await;
            queue.recv().await
        };
        let Some(item) = item else {
            break;
        };

        match context.process(&item).await {
            Ok(state) => tracing::debug!("Worker {}: {} -> {}", id, item.url, state),
            Err(e) => tracing::error!("Worker {}: error processing {}: {}", id, item.url, e),
        }

        let delay = context.scheduler.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    tracing::trace!("Worker {} exiting", id);
}

impl WorkerContext {
    /// Fetch, extract and expand one product URL; returns its final state
    async fn process(&self, item: &WorkItem) -> Result<UrlState, SweepError> {
        let profile = &item.profile;
        let mut state = item.state.transition(UrlState::Fetching)?;

        let page = match self.fetch(profile, &item.url).await {
            Ok(page) => {
                self.stats.incr(Counter::Fetched);
                state = state.transition(UrlState::Fetched)?;
                page
            }
            Err(FetchError::Cancelled { .. }) => return Ok(state),
            Err(e) => {
                if e.is_render_timeout() {
                    self.stats.incr(Counter::RenderTimeouts);
                }
                self.stats.incr(Counter::FetchFailed);
                self.stats.record_failure(e.reason(), item.url.as_str());
                tracing::warn!("[{}] {}", profile.name, e);
                return state.transition(UrlState::FetchFailed);
            }
        };

        state = state.transition(UrlState::Extracting)?;
        let extraction = match profile.extractor.extract_page(&page.html, &page.url) {
            Ok(extraction) => extraction,
            Err(failure) => {
                self.stats.incr(Counter::ExtractionFailed);
                self.stats.record_failure(failure.reason(), item.url.as_str());
                tracing::warn!("[{}] {}", profile.name, failure);
                return state.transition(UrlState::ExtractionFailed);
            }
        };
        self.stats.incr(Counter::Extracted);

        let records = self.expand(profile, extraction).await;
        let count = records.len();
        for record in records {
            if self.records.send(record).await.is_err() {
                break;
            }
        }

        state.transition(UrlState::Emitted(count))
    }

    /// Fetches a page with the brand's strategy, holding a scheduler permit
    async fn fetch(&self, profile: &BrandProfile, url: &str) -> Result<FetchedPage, FetchError> {
        let _permit = self
            .scheduler
            .acquire(url)
            .await
            .ok_or_else(|| FetchError::Cancelled {
                url: url.to_string(),
            })?;

        match (&profile.render_plan, &self.renderer) {
            (None, _) => self.fetcher.fetch_page(url).await,
            (Some(plan), Some(renderer)) => {
                retry_with_backoff(self.fetcher.policy(), || {
                    render_page(Arc::clone(renderer), url.to_string(), Arc::clone(plan))
                })
                .await
            }
            (Some(_), None) => Err(FetchError::Browser {
                url: url.to_string(),
                message: "no browser available".to_string(),
            }),
        }
    }

    /// Turns a page extraction into the records to emit
    async fn expand(&self, profile: &BrandProfile, page: PageExtraction) -> Vec<ProductRecord> {
        let base = page.record;

        let variants = match page.variants {
            VariantDetection::None => return vec![base],
            VariantDetection::Failed { swatches } => {
                tracing::warn!(
                    "[{}] {} color swatches on {} but none readable",
                    profile.name,
                    swatches,
                    base.url()
                );
                self.stats.incr(Counter::VariantDetectionFailed);
                self.stats
                    .record_failure("unreadable color swatches", base.url());
                return vec![base];
            }
            VariantDetection::Found(variants) => variants,
        };

        self.stats.incr(Counter::VariantPages);
        tracing::debug!(
            "[{}] {} colors for {}",
            profile.name,
            variants.len(),
            base.product_id()
        );

        if !profile.refetch_variants {
            return expand_in_place(&base, &variants, &profile.image_markers);
        }

        let mut records = Vec::with_capacity(variants.len());
        for variant in &variants {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            let delay = self.scheduler.next_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let gallery = match self.fetch(profile, &variant.variant_url).await {
                Ok(page) => profile.extractor.gallery(&page.html, &page.final_url),
                Err(FetchError::Cancelled { .. }) => break,
                Err(e) => {
                    self.stats.incr(Counter::VariantFailures);
                    self.stats
                        .record_failure(format!("variant: {}", e.reason()), e.url());
                    tracing::warn!(
                        "[{}] Color {} of {} failed: {}",
                        profile.name,
                        variant.color_code,
                        base.product_id(),
                        e
                    );
                    continue;
                }
            };

            let gallery = if gallery.is_empty() {
                base.image_urls().to_vec()
            } else {
                gallery
            };
            let images = filter_gallery(&gallery, &profile.image_markers, variant, base.product_id());
            records.push(variant_record(&base, variant, images));
        }

        if records.is_empty() {
            vec![base]
        } else {
            records
        }
    }
}

/// Owns the sink; stops the run once `max_items` records are written
fn spawn_writer(
    mut sink: Box<dyn RecordSink + Send>,
    mut records: mpsc::Receiver<ProductRecord>,
    max_items: Option<u64>,
    stats: Arc<RunStats>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<Result<usize, SweepError>> {
    tokio::spawn(async move {
        let limit_reached = |stats: &RunStats| {
            max_items.map_or(false, |max| stats.get(Counter::RecordsEmitted) >= max)
        };

        while let Some(record) = records.recv().await {
            if limit_reached(&stats) {
                continue;
            }

            if let Err(e) = sink.write(&record) {
                stop.store(true, Ordering::SeqCst);
                return Err(e.into());
            }
            stats.incr(Counter::RecordsEmitted);

            if limit_reached(&stats) {
                tracing::info!("Item limit reached, stopping");
                stop.store(true, Ordering::SeqCst);
            }
        }

        sink.finish()?;
        Ok::<usize, SweepError>(sink.written())
    })
}

/// Runs a complete sweep with the configured output sink
///
/// Ctrl-C sets the stop flag: no new URLs are taken and in-flight work
/// finishes normally.
///
/// Counters land in `stats`, so the caller can still report them when the
/// run fails.
pub async fn run_sweep(config: Config, stats: Arc<RunStats>) -> Result<StatsSnapshot, SweepError> {
    let sink = create_sink(&config.output)?;
    let coordinator = Coordinator::new(config)?.with_stats(stats);

    let stop = coordinator.stop_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let result = coordinator.run(sink).await;
    interrupt.abort();
    result
}
