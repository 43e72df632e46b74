//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the worker pool that drives a crawl:
//! - Seeding the frontier
//! - Dispatching targets to a fixed number of tokio workers
//! - Coordinating robots checks, fetching, discovery and extraction
//! - Early termination on the record cap or an external abort
//! - Flushing the deduplicated dataset

use crate::config::{Config, FieldsConfig};
use crate::crawler::discover::{DiscoveryRules, LinkDiscoverer};
use crate::crawler::extract::{ExtractorRegistry, SelectorExtractor};
use crate::crawler::fetcher::{FetchResult, Fetcher};
use crate::crawler::frontier::{Admission, Frontier, FrontierLimits, VisitedStore};
use crate::crawler::sink::DedupSink;
use crate::output::{CrawlStatistics, CrawlStats};
use crate::robots::RobotsCache;
use crate::state::{DiscoveryTarget, Record, TargetKind};
use crate::url::UrlScope;
use crate::{HarvestError, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

/// Progress is logged every this many fetched targets
const PROGRESS_INTERVAL: usize = 25;

/// Why a crawl stopped before its frontier was exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `max_items` records were accepted
    MaxItems,
    /// The abort handle was triggered
    Aborted,
}

/// Result of a completed crawl
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Accepted records in acceptance order
    pub records: Vec<Record>,
    pub statistics: CrawlStatistics,
    /// None when the frontier was exhausted
    pub stop_reason: Option<StopReason>,
}

/// Frontier plus the bookkeeping that decides when workers finish
struct WorkState {
    frontier: Frontier,
    in_flight: usize,
    stop_reason: Option<StopReason>,
}

/// State shared by the workers and the abort handle
struct Shared {
    state: Mutex<WorkState>,
    wakeup: Notify,
}

/// What a worker should do next
enum Next<'a> {
    Process(DiscoveryTarget),
    Wait(Notified<'a>),
    Finish,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, WorkState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn next(&self) -> Next<'_> {
        let mut state = self.lock();
        if state.stop_reason.is_some() {
            return Next::Finish;
        }

        match state.frontier.dequeue() {
            Some(target) => {
                state.in_flight += 1;
                Next::Process(target)
            }
            None if state.in_flight == 0 => {
                drop(state);
                // Let idle workers observe the exhausted frontier
                self.wakeup.notify_waiters();
                Next::Finish
            }
            // Registered while the lock is held so no wakeup is missed
            None => Next::Wait(self.wakeup.notified()),
        }
    }

    fn complete(&self) {
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.wakeup.notify_waiters();
    }

    fn stop(&self, reason: StopReason) {
        {
            let mut state = self.lock();
            if state.stop_reason.is_none() {
                state.stop_reason = Some(reason);
            }
        }
        self.wakeup.notify_waiters();
    }

    fn stop_reason(&self) -> Option<StopReason> {
        self.lock().stop_reason
    }

    fn is_stopped(&self) -> bool {
        self.stop_reason().is_some()
    }
}

/// Handle for stopping a running crawl from outside
///
/// Workers stop dequeuing; targets already being processed finish.
#[derive(Clone)]
pub struct AbortHandle {
    shared: Arc<Shared>,
}

impl AbortHandle {
    pub fn abort(&self) {
        tracing::info!("Abort requested, draining in-flight work");
        self.shared.stop(StopReason::Aborted);
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.stop_reason() == Some(StopReason::Aborted)
    }
}

/// Everything a worker needs, shared through an `Arc`
struct Context {
    shared: Arc<Shared>,
    visited: Arc<VisitedStore>,
    fetcher: Fetcher,
    discoverers: Vec<LinkDiscoverer>,
    extractors: ExtractorRegistry,
    robots: Option<RobotsCache>,
    sink: Mutex<DedupSink>,
    stats: CrawlStats,
    max_items: usize,
    seed_keys: HashSet<String>,
    seeds_fetched: AtomicUsize,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Fetcher,
    discoverers: Vec<LinkDiscoverer>,
    extractors: ExtractorRegistry,
    visited: Arc<VisitedStore>,
    shared: Arc<Shared>,
}

impl Coordinator {
    /// Creates a coordinator using the extractors described by the
    /// configured sources
    pub fn new(config: Config) -> Result<Self> {
        let extractors = default_extractors(&config)?;
        Self::with_extractors(config, extractors)
    }

    /// Creates a coordinator with a caller-supplied extractor registry
    pub fn with_extractors(config: Config, extractors: ExtractorRegistry) -> Result<Self> {
        crate::config::validate(&config)?;

        let fetcher = Fetcher::from_config(&config)?;
        let discoverers = config
            .sources
            .iter()
            .map(|source| DiscoveryRules::from_source(source).map(LinkDiscoverer::new))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let visited = Arc::new(VisitedStore::new());
        let frontier = Frontier::new(visited.clone(), FrontierLimits::from_config(&config.crawler));
        let shared = Arc::new(Shared {
            state: Mutex::new(WorkState {
                frontier,
                in_flight: 0,
                stop_reason: None,
            }),
            wakeup: Notify::new(),
        });

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            discoverers,
            extractors,
            visited,
            shared,
        })
    }

    /// Returns a handle that stops the crawl when triggered
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            shared: self.shared.clone(),
        }
    }

    /// Builds the depth-0 seed targets of every source
    pub fn seeds(&self) -> Result<Vec<DiscoveryTarget>> {
        let mut seeds = Vec::new();
        for source in &self.config.sources {
            for seed in &source.seeds {
                seeds.push(DiscoveryTarget::seed(seed, source.seed_kind)?);
            }
        }
        Ok(seeds)
    }

    /// Runs the crawl to completion
    ///
    /// Returns the flushed records and statistics. Fails with
    /// [`HarvestError::AllSeedsFailed`] if no seed could be fetched.
    pub async fn run(self) -> Result<CrawlReport> {
        let seeds = self.seeds()?;
        let mut seed_keys = HashSet::new();
        {
            let mut state = self.shared.lock();
            for seed in seeds {
                let key = seed.key().to_string();
                match state.frontier.seed(seed) {
                    Admission::Queued => {
                        seed_keys.insert(key);
                    }
                    outcome => tracing::warn!("Seed {} not queued: {:?}", key, outcome),
                }
            }
        }
        if seed_keys.is_empty() {
            return Err(HarvestError::NoSeeds);
        }

        let crawler = &self.config.crawler;
        let robots = crawler.respect_robots.then(|| {
            RobotsCache::new(
                self.config.user_agent.crawler_name.clone(),
                Duration::from_secs_f64(1.0 / crawler.requests_per_second),
            )
        });

        tracing::info!(
            "Starting crawl: {} seeds, {} workers, {} req/s, max depth {}",
            seed_keys.len(),
            crawler.worker_count,
            crawler.requests_per_second,
            crawler.max_depth
        );

        let seed_count = seed_keys.len();
        let context = Arc::new(Context {
            shared: self.shared.clone(),
            visited: self.visited.clone(),
            fetcher: self.fetcher.clone(),
            discoverers: self.discoverers.clone(),
            extractors: self.extractors.clone(),
            robots,
            sink: Mutex::new(DedupSink::new(crawler.max_items)),
            stats: CrawlStats::new(),
            max_items: crawler.max_items,
            seed_keys,
            seeds_fetched: AtomicUsize::new(0),
        });

        let workers: Vec<_> = (0..crawler.worker_count)
            .map(|id| tokio::spawn(worker(context.clone(), id)))
            .collect();
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!("Crawl worker failed: {}", e);
            }
        }

        let sink = std::mem::replace(&mut *lock_sink(&context.sink), DedupSink::new(0));
        let statistics = context.stats.snapshot().with_rejections(sink.rejections());
        let records = sink.flush();
        let stop_reason = self.shared.stop_reason();

        tracing::info!(
            "Crawl finished in {:.1}s: {} targets fetched, {} records accepted{}",
            statistics.duration_seconds(),
            statistics.targets_fetched(),
            records.len(),
            match stop_reason {
                Some(StopReason::MaxItems) => " (record cap reached)",
                Some(StopReason::Aborted) => " (aborted)",
                None => "",
            }
        );

        if context.seeds_fetched.load(Ordering::Relaxed) == 0
            && stop_reason != Some(StopReason::Aborted)
        {
            return Err(HarvestError::AllSeedsFailed { seeds: seed_count });
        }

        Ok(CrawlReport {
            records,
            statistics,
            stop_reason,
        })
    }
}

/// Builds one selector extractor per source, scoped to the source domain
///
/// Sources without field rules get generic article rules.
pub fn default_extractors(config: &Config) -> Result<ExtractorRegistry> {
    let mut registry = ExtractorRegistry::new();
    for source in &config.sources {
        let fields = source
            .fields
            .clone()
            .unwrap_or_else(FieldsConfig::article_defaults);
        let extractor = SelectorExtractor::new(source.name.clone(), &fields)?;
        registry.register(UrlScope::domain(source.domain.clone()), Arc::new(extractor));
    }
    Ok(registry)
}

/// Runs a complete crawl with the configured extractors
pub async fn run_crawl(config: Config) -> Result<CrawlReport> {
    Coordinator::new(config)?.run().await
}

fn lock_sink(sink: &Mutex<DedupSink>) -> MutexGuard<'_, DedupSink> {
    match sink.lock() {
        Ok(sink) => sink,
        Err(poisoned) => poisoned.into_inner(),
    }
}

async fn worker(ctx: Arc<Context>, id: usize) {
    tracing::debug!("Worker {} started", id);

    loop {
        match ctx.shared.next() {
            Next::Process(target) => {
                let _in_flight = InFlight(&ctx.shared);
                let label = target.to_string();
                // Panics stay contained to the target's own task
                let task = tokio::spawn(process_owned(ctx.clone(), target));
                if let Err(e) = task.await {
                    tracing::error!("Processing {} failed: {}", label, e);
                    ctx.stats.record_task_failure();
                }
            }
            Next::Wait(notified) => notified.await,
            Next::Finish => break,
        }
    }

    tracing::debug!("Worker {} finished", id);
}

/// Marks one dequeued target as finished when dropped
struct InFlight<'a>(&'a Shared);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.complete();
    }
}

async fn process_owned(ctx: Arc<Context>, target: DiscoveryTarget) {
    process_target(&ctx, &target).await
}

async fn process_target(ctx: &Context, target: &DiscoveryTarget) {
    if ctx.shared.is_stopped() {
        return;
    }

    if let Some(robots) = &ctx.robots {
        if !robots.is_allowed(&ctx.fetcher, target.url()).await {
            tracing::info!("{} disallowed by robots.txt", target.url());
            ctx.stats.record_robots_denied();
            return;
        }
    }

    // The robots lookup may have taken a while
    if ctx.shared.is_stopped() {
        return;
    }

    let page = ctx.fetcher.fetch(target.url()).await;
    if !page.is_success() {
        tracing::warn!(
            "Dropping {} after {} attempt(s): {}",
            target,
            page.attempts,
            page.error.as_deref().unwrap_or("unknown error")
        );
        ctx.stats.record_fetch_failure();
        return;
    }

    if ctx.seed_keys.contains(target.key()) {
        ctx.seeds_fetched.fetch_add(1, Ordering::Relaxed);
    }

    let fetched = ctx.stats.record_fetched(target.kind());
    if fetched % PROGRESS_INTERVAL == 0 {
        let (queued, containers, items) = {
            let state = ctx.shared.lock();
            (
                state.frontier.len(),
                state.frontier.containers_admitted(),
                state.frontier.items_admitted(),
            )
        };
        tracing::info!(
            "Progress: {} targets fetched, {} queued ({} containers, {} items admitted), {} records",
            fetched,
            queued,
            containers,
            items,
            lock_sink(&ctx.sink).len()
        );
    }

    match target.kind() {
        TargetKind::Container => discover_children(ctx, target, &page),
        TargetKind::Item => extract_record(ctx, target, &page),
    }
}

fn discover_children(ctx: &Context, target: &DiscoveryTarget, page: &FetchResult) {
    let Some(discoverer) = ctx
        .discoverers
        .iter()
        .find(|d| d.rules().scope.matches_host(target.url()))
    else {
        tracing::warn!("No source covers container {}", target.url());
        return;
    };

    let children = match discoverer.discover(page, target, &ctx.visited) {
        Ok(children) => children,
        Err(e) => {
            tracing::warn!("Dropping container {}: {}", target.url(), e);
            ctx.stats.record_discover_error();
            return;
        }
    };
    ctx.stats.record_discovered(children.len());

    let mut queued = 0;
    {
        let mut state = ctx.shared.lock();
        if state.stop_reason.is_some() {
            return;
        }
        for child in children {
            let admission = state.frontier.admit(child);
            if admission == Admission::Queued {
                queued += 1;
            }
            ctx.stats.record_admission(admission);
        }
    }

    if queued > 0 {
        ctx.shared.wakeup.notify_waiters();
    }
}

fn extract_record(ctx: &Context, target: &DiscoveryTarget, page: &FetchResult) {
    let Some(extractor) = ctx.extractors.find(target.url()) else {
        tracing::debug!("No extractor registered for {}", target.url());
        ctx.stats.record_extraction_failure();
        return;
    };

    let Some(record) = extractor.extract(page, target.url()) else {
        tracing::debug!(
            "Extractor '{}' produced no record for {}",
            extractor.name(),
            target.url()
        );
        ctx.stats.record_extraction_failure();
        return;
    };

    let accepted_total = {
        let mut sink = lock_sink(&ctx.sink);
        if !sink.offer(record) {
            return;
        }
        sink.len()
    };
    ctx.stats.record_accepted();

    if accepted_total >= ctx.max_items {
        tracing::info!("Accepted {} records, stopping", accepted_total);
        ctx.shared.stop(StopReason::MaxItems);
    }
}
